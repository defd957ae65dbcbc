//! Variable arena.
//!
//! Every logical variable of a query lives exactly once in the [`VarArena`] and is
//! referenced everywhere else through its [`VarId`]. Passes that need to change a
//! variable (e.g. clearing a hoisted inline predicate) write through the handle, so
//! every select that references it sees the change.
//!
//! Unique names are derived from source positions and therefore stable across the
//! whole pipeline:
//!
//! ```text
//! MATCH (a)-[r]->()      a  -> a_6
//!                        r  -> r_9
//!                        () -> anon_15
//! ```

use std::cell::OnceCell;
use std::fmt;

use crate::open_cypher_parser::ast::Direction;
use crate::query_planner::errors::{LoweringError, LoweringResult};
use crate::query_planner::logical_expr::Expr;
use crate::query_planner::scope::ClauseId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl VarId {
    pub fn from_raw(raw: u32) -> Self {
        VarId(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// `{key: value}` from a node pattern, waiting to be hoisted into a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct InlinePredicate {
    pub key: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarKind {
    Node {
        labels: Vec<String>,
        predicates: Vec<InlinePredicate>,
    },
    Relationship {
        labels: Vec<String>,
        direction: Direction,
    },
    Path {
        /// Total hop count when every relationship of the path has a fixed length.
        fixed_length: Option<u32>,
    },
    Alias {
        expr: Expr,
        /// Stage that computes the aliased expression.
        defined_in: ClauseId,
    },
    /// Compiler-introduced name: join table aliases, intermediate tables of
    /// multi-hop paths and forwarded union columns. `column` is the output
    /// column it stands for, when it stands for one.
    Temp { column: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    Node,
    Relationship,
    Path,
    Map,
    Scalar,
}

#[derive(Debug, Clone)]
pub struct Var {
    pub name: String,
    pub unique_name: String,
    pub kind: VarKind,
    resolved_type: OnceCell<VarType>,
}

impl Var {
    fn new(name: String, unique_name: String, kind: VarKind) -> Self {
        Var {
            name,
            unique_name,
            kind,
            resolved_type: OnceCell::new(),
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, VarKind::Node { .. })
    }

    pub fn is_alias(&self) -> bool {
        matches!(self.kind, VarKind::Alias { .. })
    }

    pub fn alias_expr(&self) -> Option<&Expr> {
        match &self.kind {
            VarKind::Alias { expr, .. } => Some(expr),
            _ => None,
        }
    }

    pub fn labels(&self) -> &[String] {
        match &self.kind {
            VarKind::Node { labels, .. } | VarKind::Relationship { labels, .. } => labels,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VarArena {
    vars: Vec<Var>,
    temp_counter: u32,
}

impl VarArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn push(&mut self, var: Var) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(var);
        id
    }

    /// Node variable declared at byte offset `position`. Anonymous nodes get
    /// `anon_<position>`.
    pub fn add_node(&mut self, name: Option<&str>, position: usize, labels: Vec<String>) -> VarId {
        let (name, unique_name) = Self::names(name, position);
        self.push(Var::new(
            name,
            unique_name,
            VarKind::Node {
                labels,
                predicates: vec![],
            },
        ))
    }

    /// Intermediate node of an expanded fixed-length relationship.
    pub fn add_intermediate_node(&mut self, position: usize, index: u32) -> VarId {
        let unique_name = format!("_anon{}_{}", position, index);
        self.push(Var::new(
            unique_name.clone(),
            unique_name,
            VarKind::Node {
                labels: vec![],
                predicates: vec![],
            },
        ))
    }

    pub fn add_relationship(
        &mut self,
        name: &str,
        position: usize,
        labels: Vec<String>,
        direction: Direction,
    ) -> VarId {
        let (name, unique_name) = Self::names(Some(name), position);
        self.push(Var::new(
            name,
            unique_name,
            VarKind::Relationship { labels, direction },
        ))
    }

    pub fn add_path(&mut self, name: &str, position: usize, fixed_length: Option<u32>) -> VarId {
        let (name, unique_name) = Self::names(Some(name), position);
        self.push(Var::new(name, unique_name, VarKind::Path { fixed_length }))
    }

    pub fn add_alias(&mut self, name: &str, position: usize, expr: Expr, defined_in: ClauseId) -> VarId {
        let (name, unique_name) = Self::names(Some(name), position);
        self.push(Var::new(name, unique_name, VarKind::Alias { expr, defined_in }))
    }

    pub fn add_temp(&mut self, column: Option<String>) -> VarId {
        self.temp_counter += 1;
        let unique_name = format!("__t{}", self.temp_counter);
        self.push(Var::new(
            unique_name.clone(),
            unique_name,
            VarKind::Temp { column },
        ))
    }

    fn names(name: Option<&str>, position: usize) -> (String, String) {
        match name {
            Some(name) => (name.to_string(), format!("{}_{}", name, position)),
            None => {
                let anon = format!("anon_{}", position);
                (anon.clone(), anon)
            }
        }
    }

    pub fn get(&self, id: VarId) -> LoweringResult<&Var> {
        self.vars
            .get(id.index())
            .ok_or_else(|| LoweringError::bug(format!("unknown variable handle {}", id)))
    }

    pub fn get_mut(&mut self, id: VarId) -> LoweringResult<&mut Var> {
        self.vars
            .get_mut(id.index())
            .ok_or_else(|| LoweringError::bug(format!("unknown variable handle {}", id)))
    }

    pub fn ids(&self) -> impl Iterator<Item = VarId> + '_ {
        (0..self.vars.len()).map(|i| VarId(i as u32))
    }

    pub fn unique_name(&self, id: VarId) -> &str {
        self.vars
            .get(id.index())
            .map(|v| v.unique_name.as_str())
            .unwrap_or("?")
    }

    /// Merges `labels` into an existing node variable. Labels on anything but a
    /// node are rejected.
    pub fn add_labels(&mut self, id: VarId, new_labels: &[String]) -> LoweringResult<()> {
        if new_labels.is_empty() {
            return Ok(());
        }
        let var = self.get_mut(id)?;
        match &mut var.kind {
            VarKind::Node { labels, .. } => {
                for label in new_labels {
                    if !labels.contains(label) {
                        labels.push(label.clone());
                    }
                }
                Ok(())
            }
            _ => Err(LoweringError::invalid(format!(
                "`{}` is not a node and cannot take labels",
                var.name
            ))),
        }
    }

    pub fn add_predicates(&mut self, id: VarId, new: Vec<InlinePredicate>) -> LoweringResult<()> {
        if new.is_empty() {
            return Ok(());
        }
        let var = self.get_mut(id)?;
        match &mut var.kind {
            VarKind::Node { predicates, .. } => {
                predicates.extend(new);
                Ok(())
            }
            _ => Err(LoweringError::invalid(format!(
                "`{}` is not a node and cannot take a property map",
                var.name
            ))),
        }
    }

    /// Follows `Variable` alias chains down to the variable they stand for.
    pub fn resolve_alias(&self, id: VarId) -> VarId {
        let mut current = id;
        // chains are acyclic by construction; the bound only protects against bugs
        for _ in 0..=self.vars.len() {
            match self.vars.get(current.index()).and_then(Var::alias_expr) {
                Some(Expr::Variable(next)) => current = *next,
                _ => return current,
            }
        }
        current
    }

    pub fn var_type(&self, id: VarId) -> VarType {
        match self.vars.get(id.index()) {
            Some(var) => *var.resolved_type.get_or_init(|| self.compute_type(var, 0)),
            None => VarType::Scalar,
        }
    }

    fn compute_type(&self, var: &Var, depth: usize) -> VarType {
        match &var.kind {
            VarKind::Node { .. } => VarType::Node,
            VarKind::Relationship { .. } => VarType::Relationship,
            VarKind::Path { .. } => VarType::Path,
            VarKind::Temp { .. } => VarType::Scalar,
            VarKind::Alias { expr, .. } => self.expr_type(expr, depth + 1),
        }
    }

    /// Static type of an expression, looking through aliases and map literals.
    pub fn expr_type(&self, expr: &Expr, depth: usize) -> VarType {
        if depth > self.vars.len() {
            return VarType::Scalar;
        }
        match expr {
            Expr::Variable(id) => match self.vars.get(id.index()) {
                Some(var) => self.compute_type(var, depth + 1),
                None => VarType::Scalar,
            },
            Expr::Map(_) => VarType::Map,
            Expr::Aliased(aliased) => self.expr_type(&aliased.expr, depth + 1),
            Expr::PropertyAccess(prop) => match self.map_entry(&prop.base, &prop.key, depth + 1) {
                Some(entry) => self.expr_type(entry, depth + 1),
                None => VarType::Scalar,
            },
            _ => VarType::Scalar,
        }
    }

    /// The entry `key` of the map literal `expr` evaluates to, if statically known.
    pub fn map_entry<'e>(&'e self, expr: &'e Expr, key: &str, depth: usize) -> Option<&'e Expr> {
        if depth > self.vars.len() {
            return None;
        }
        match expr {
            Expr::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            Expr::Variable(id) => self
                .vars
                .get(id.index())
                .and_then(Var::alias_expr)
                .and_then(|e| self.map_entry(e, key, depth + 1)),
            Expr::PropertyAccess(prop) => self
                .map_entry(&prop.base, &prop.key, depth + 1)
                .and_then(|inner| self.map_entry(inner, key, depth + 1)),
            _ => None,
        }
    }

    /// Variables a map-valued variable carries, transitively through nested maps
    /// and aliases. For any other variable this is the variable itself.
    pub fn underlying_vars(&self, id: VarId) -> Vec<VarId> {
        let mut out = vec![];
        self.collect_underlying(id, &mut out, 0);
        out
    }

    fn collect_underlying(&self, id: VarId, out: &mut Vec<VarId>, depth: usize) {
        if depth > self.vars.len() {
            return;
        }
        if self.var_type(id) != VarType::Map {
            if !out.contains(&id) {
                out.push(id);
            }
            return;
        }
        if let Some(expr) = self.vars.get(id.index()).and_then(Var::alias_expr) {
            for inner in expr.variables() {
                self.collect_underlying(inner, out, depth + 1);
            }
        }
    }

    /// Removes and returns the inline predicates of a node.
    pub fn take_predicates(&mut self, id: VarId) -> Vec<InlinePredicate> {
        match self.vars.get_mut(id.index()).map(|v| &mut v.kind) {
            Some(VarKind::Node { predicates, .. }) => std::mem::take(predicates),
            _ => vec![],
        }
    }

    pub fn predicates(&self, id: VarId) -> &[InlinePredicate] {
        match self.vars.get(id.index()).map(|v| &v.kind) {
            Some(VarKind::Node { predicates, .. }) => predicates,
            _ => &[],
        }
    }

    /// Replaces the expression of an alias variable. The cached type is
    /// dropped since the new expression may resolve differently.
    pub fn set_alias_expr(&mut self, id: VarId, new_expr: Expr) -> LoweringResult<()> {
        let var = self.get_mut(id)?;
        match &mut var.kind {
            VarKind::Alias { expr, .. } => {
                *expr = new_expr;
                var.resolved_type = OnceCell::new();
                Ok(())
            }
            _ => Err(LoweringError::bug(format!(
                "`{}` is not an alias",
                var.unique_name
            ))),
        }
    }

    pub fn alias_ids(&self) -> Vec<VarId> {
        self.ids()
            .filter(|id| self.vars[id.index()].is_alias())
            .collect()
    }
}
