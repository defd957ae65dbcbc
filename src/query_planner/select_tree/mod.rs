//! Relational query tree.
//!
//! ```text
//! BaseSelect
//! ├── Simple(SimpleSelect)   one stage: FROM items, joins, WHERE, exports
//! ├── Scope(ScopeSelect)     chain of named stages + final `ret`
//! └── Union(UnionSelect)     alternatives produced by ambiguous labels
//! ```
//!
//! Every node is tagged with the [`ClauseId`] of the stage it computes.
//! [`FromItem::source`] names a sibling stage of the enclosing [`ScopeSelect`]
//! rather than pointing at it, so cloned chains stay internally consistent.

use std::fmt;

use crate::open_cypher_parser::ast::SortOrder;
use crate::query_planner::errors::LoweringResult;
use crate::query_planner::logical_expr::Expr;
use crate::query_planner::scope::ClauseId;
use crate::query_planner::variables::{VarArena, VarId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

/// Declares where a group of variables comes from: a concrete table
/// (`source == None`) or an earlier stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub variables: Vec<VarId>,
    pub source: Option<String>,
    pub source_table_name: Option<String>,
}

impl FromItem {
    pub fn native(var: VarId) -> Self {
        FromItem {
            variables: vec![var],
            source: None,
            source_table_name: None,
        }
    }

    pub fn table(var: VarId, table: &str) -> Self {
        FromItem {
            variables: vec![var],
            source: None,
            source_table_name: Some(table.to_string()),
        }
    }

    pub fn sourced(stage: &str, variables: Vec<VarId>) -> Self {
        FromItem {
            variables,
            source: Some(stage.to_string()),
            source_table_name: None,
        }
    }

    pub fn is_native(&self) -> bool {
        self.source.is_none()
    }

    pub fn supplies(&self, var: VarId) -> bool {
        self.variables.contains(&var)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BaseJoin {
    pub joining_item: FromItem,
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimpleSelect {
    pub clause: ClauseId,
    /// Kind of every join of this select; inner and left joins never mix.
    /// Left joins form one group: the first join's condition is the `ON`
    /// of the whole group and the joins after it are inner joins within it.
    pub join_kind: JoinKind,
    pub exported_items: Vec<Expr>,
    pub where_condition: Option<Expr>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub distinct: bool,
    pub order_by: Vec<(Expr, SortOrder)>,
    pub from_items: Vec<FromItem>,
    pub joins: Vec<BaseJoin>,
}

impl SimpleSelect {
    pub fn new(clause: ClauseId, join_kind: JoinKind) -> Self {
        SimpleSelect {
            clause,
            join_kind,
            exported_items: vec![],
            where_condition: None,
            limit: None,
            skip: None,
            distinct: false,
            order_by: vec![],
            from_items: vec![],
            joins: vec![],
        }
    }

    /// Copies the scalar fields; from items and joins only when asked.
    pub fn shallow_clone(&self, with_from_items: bool) -> Self {
        SimpleSelect {
            clause: self.clause,
            join_kind: self.join_kind,
            exported_items: self.exported_items.clone(),
            where_condition: self.where_condition.clone(),
            limit: self.limit,
            skip: self.skip,
            distinct: self.distinct,
            order_by: self.order_by.clone(),
            from_items: if with_from_items {
                self.from_items.clone()
            } else {
                vec![]
            },
            joins: if with_from_items {
                self.joins.clone()
            } else {
                vec![]
            },
        }
    }

    /// Every from item, including those attached to joins.
    pub fn all_from_items(&self) -> impl Iterator<Item = &FromItem> {
        self.from_items
            .iter()
            .chain(self.joins.iter().map(|j| &j.joining_item))
    }

    pub fn all_from_items_mut(&mut self) -> impl Iterator<Item = &mut FromItem> {
        self.from_items
            .iter_mut()
            .chain(self.joins.iter_mut().map(|j| &mut j.joining_item))
    }

    pub fn supplier_of(&self, var: VarId) -> Option<&FromItem> {
        self.all_from_items().find(|item| item.supplies(var))
    }

    pub fn exprs(&self) -> Vec<&Expr> {
        let mut exprs: Vec<&Expr> = self.exported_items.iter().collect();
        exprs.extend(self.where_condition.iter());
        exprs.extend(self.order_by.iter().map(|(e, _)| e));
        exprs.extend(self.joins.iter().map(|j| &j.condition));
        exprs
    }

    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        let mut exprs: Vec<&mut Expr> = self.exported_items.iter_mut().collect();
        exprs.extend(self.where_condition.iter_mut());
        exprs.extend(self.order_by.iter_mut().map(|(e, _)| e));
        exprs.extend(self.joins.iter_mut().map(|j| &mut j.condition));
        exprs
    }

    /// True when an export aggregates, either directly or through an alias
    /// this select computes.
    pub fn aggregates(&self, vars: &VarArena) -> bool {
        self.exported_items.iter().any(|item| match item {
            Expr::Variable(var) if self.supplier_of(*var).is_none() => vars
                .get(*var)
                .ok()
                .and_then(|v| v.alias_expr())
                .is_some_and(Expr::contains_aggregate),
            other => other.contains_aggregate(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeSelect {
    pub clause: ClauseId,
    pub with_queries: Vec<WithSelect>,
    pub ret: SimpleSelect,
}

impl ScopeSelect {
    pub fn stage(&self, name: &str) -> Option<&WithSelect> {
        self.with_queries.iter().find(|w| w.subquery_name == name)
    }

    /// Stage selects of this scope that are plain selects, followed by `ret`.
    pub fn simple_selects(&self) -> Vec<&SimpleSelect> {
        let mut selects: Vec<&SimpleSelect> = self
            .with_queries
            .iter()
            .filter_map(|w| match w.subquery.as_ref() {
                BaseSelect::Simple(s) => Some(s),
                _ => None,
            })
            .collect();
        selects.push(&self.ret);
        selects
    }

    pub fn simple_selects_mut(&mut self) -> Vec<&mut SimpleSelect> {
        let mut selects: Vec<&mut SimpleSelect> = self
            .with_queries
            .iter_mut()
            .filter_map(|w| match w.subquery.as_mut() {
                BaseSelect::Simple(s) => Some(s),
                _ => None,
            })
            .collect();
        selects.push(&mut self.ret);
        selects
    }

    /// True when no stage nests another scope.
    pub fn is_leaf(&self) -> bool {
        self.with_queries
            .iter()
            .all(|w| !w.subquery.contains_scope())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnionBranch {
    Simple(SimpleSelect),
    Scope(ScopeSelect),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionSelect {
    pub clause: ClauseId,
    pub unions: Vec<UnionBranch>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithSelect {
    pub subquery_name: String,
    pub subquery: Box<BaseSelect>,
}

impl WithSelect {
    pub fn new(subquery_name: impl Into<String>, subquery: BaseSelect) -> Self {
        WithSelect {
            subquery_name: subquery_name.into(),
            subquery: Box::new(subquery),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BaseSelect {
    Simple(SimpleSelect),
    Scope(ScopeSelect),
    Union(UnionSelect),
}

impl BaseSelect {
    pub fn clause(&self) -> ClauseId {
        match self {
            BaseSelect::Simple(s) => s.clause,
            BaseSelect::Scope(s) => s.clause,
            BaseSelect::Union(u) => u.clause,
        }
    }

    pub fn contains_scope(&self) -> bool {
        match self {
            BaseSelect::Simple(_) => false,
            BaseSelect::Scope(_) => true,
            BaseSelect::Union(u) => u.unions.iter().any(|b| matches!(b, UnionBranch::Scope(_))),
        }
    }

    /// Calls `f` on every scope of the tree, outermost first.
    pub fn for_each_scope<F>(&self, f: &mut F) -> LoweringResult<()>
    where
        F: FnMut(&ScopeSelect) -> LoweringResult<()>,
    {
        match self {
            BaseSelect::Simple(_) => Ok(()),
            BaseSelect::Scope(scope) => {
                f(scope)?;
                for w in &scope.with_queries {
                    w.subquery.for_each_scope(f)?;
                }
                Ok(())
            }
            BaseSelect::Union(u) => {
                for branch in &u.unions {
                    if let UnionBranch::Scope(scope) = branch {
                        BaseSelect::for_each_scope_ref(scope, f)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn for_each_scope_ref<F>(scope: &ScopeSelect, f: &mut F) -> LoweringResult<()>
    where
        F: FnMut(&ScopeSelect) -> LoweringResult<()>,
    {
        f(scope)?;
        for w in &scope.with_queries {
            w.subquery.for_each_scope(f)?;
        }
        Ok(())
    }

    /// Mutable variant of [`BaseSelect::for_each_scope`]. `f` runs on a scope
    /// before its nested scopes.
    pub fn for_each_scope_mut<F>(&mut self, f: &mut F) -> LoweringResult<()>
    where
        F: FnMut(&mut ScopeSelect) -> LoweringResult<()>,
    {
        match self {
            BaseSelect::Simple(_) => Ok(()),
            BaseSelect::Scope(scope) => Self::for_each_scope_mut_ref(scope, f),
            BaseSelect::Union(u) => {
                for branch in &mut u.unions {
                    if let UnionBranch::Scope(scope) = branch {
                        Self::for_each_scope_mut_ref(scope, f)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn for_each_scope_mut_ref<F>(scope: &mut ScopeSelect, f: &mut F) -> LoweringResult<()>
    where
        F: FnMut(&mut ScopeSelect) -> LoweringResult<()>,
    {
        f(scope)?;
        for w in &mut scope.with_queries {
            w.subquery.for_each_scope_mut(f)?;
        }
        Ok(())
    }

    /// Every simple select of the tree, including union branches.
    pub fn for_each_simple_mut<F>(&mut self, f: &mut F) -> LoweringResult<()>
    where
        F: FnMut(&mut SimpleSelect) -> LoweringResult<()>,
    {
        match self {
            BaseSelect::Simple(s) => f(s),
            BaseSelect::Scope(scope) => Self::for_each_simple_in_scope(scope, f),
            BaseSelect::Union(u) => {
                for branch in &mut u.unions {
                    match branch {
                        UnionBranch::Simple(s) => f(s)?,
                        UnionBranch::Scope(scope) => Self::for_each_simple_in_scope(scope, f)?,
                    }
                }
                Ok(())
            }
        }
    }

    fn for_each_simple_in_scope<F>(scope: &mut ScopeSelect, f: &mut F) -> LoweringResult<()>
    where
        F: FnMut(&mut SimpleSelect) -> LoweringResult<()>,
    {
        for w in &mut scope.with_queries {
            w.subquery.for_each_simple_mut(f)?;
        }
        f(&mut scope.ret)
    }

    /// Read-only walk over every simple select.
    pub fn simple_selects(&self) -> Vec<&SimpleSelect> {
        let mut out = vec![];
        self.collect_simple(&mut out);
        out
    }

    fn collect_simple<'a>(&'a self, out: &mut Vec<&'a SimpleSelect>) {
        match self {
            BaseSelect::Simple(s) => out.push(s),
            BaseSelect::Scope(scope) => Self::collect_simple_in_scope(scope, out),
            BaseSelect::Union(u) => {
                for branch in &u.unions {
                    match branch {
                        UnionBranch::Simple(s) => out.push(s),
                        UnionBranch::Scope(scope) => Self::collect_simple_in_scope(scope, out),
                    }
                }
            }
        }
    }

    fn collect_simple_in_scope<'a>(scope: &'a ScopeSelect, out: &mut Vec<&'a SimpleSelect>) {
        for w in &scope.with_queries {
            w.subquery.collect_simple(out);
        }
        out.push(&scope.ret);
    }
}

impl fmt::Display for BaseSelect {
    /// Compact outline, for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseSelect::Simple(s) => write!(
                f,
                "Simple({}, from={}, joins={})",
                s.clause,
                s.from_items.len(),
                s.joins.len()
            ),
            BaseSelect::Scope(scope) => {
                write!(f, "Scope({}: [", scope.clause)?;
                for (i, w) in scope.with_queries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", w.subquery_name, w.subquery)?;
                }
                write!(f, "] ret={})", BaseSelect::Simple(scope.ret.clone()))
            }
            BaseSelect::Union(u) => write!(f, "Union({} branches)", u.unions.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_planner::scope::ClauseKind;

    #[test]
    fn test_shallow_clone_optionally_drops_sources() {
        let mut select = SimpleSelect::new(ClauseId::new(0, ClauseKind::Match), JoinKind::Inner);
        select.from_items.push(FromItem::table(VarId::from_raw(0), "persons"));
        select.limit = Some(5);

        let bare = select.shallow_clone(false);
        assert!(bare.from_items.is_empty());
        assert_eq!(bare.limit, Some(5));
        assert_eq!(select.shallow_clone(true), select);
    }

    #[test]
    fn test_leaf_detection() {
        let ret = SimpleSelect::new(ClauseId::new(9, ClauseKind::Return), JoinKind::Inner);
        let inner = ScopeSelect {
            clause: ret.clause,
            with_queries: vec![WithSelect::new(
                "match_0",
                BaseSelect::Simple(SimpleSelect::new(
                    ClauseId::new(0, ClauseKind::Match),
                    JoinKind::Inner,
                )),
            )],
            ret: ret.clone(),
        };
        assert!(inner.is_leaf());
        let outer = ScopeSelect {
            clause: ret.clause,
            with_queries: vec![WithSelect::new(
                "union_9",
                BaseSelect::Union(UnionSelect {
                    clause: ret.clause,
                    unions: vec![UnionBranch::Scope(inner.clone()), UnionBranch::Scope(inner)],
                }),
            )],
            ret,
        };
        assert!(!outer.is_leaf());
        assert_eq!(BaseSelect::Scope(outer).simple_selects().len(), 5);
    }
}
