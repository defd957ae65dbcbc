//! Intermediate expression tree.
//!
//! [`Expr`] is what every lowering pass reads and rewrites. Variables are
//! referenced through [`VarId`] handles into the query's
//! [`VarArena`](crate::query_planner::variables::VarArena), never by name.

use std::fmt;

pub use crate::open_cypher_parser::ast::Operator;
use crate::query_planner::variables::VarId;

pub mod ast_conversion;
pub mod constant_folding;
pub mod visitors;

use visitors::{walk_expression, ExpressionVisitor};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "'{}'", s),
            Literal::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),

    /// Reference to a variable through its arena handle.
    Variable(VarId),

    /// A parameter, such as `$param`.
    Parameter(String),

    /// Argument of `count(*)`.
    Star,

    /// `base.key`
    PropertyAccess(PropertyAccess),

    /// A physical column of the table behind a variable. Join keys and row
    /// restrictions are expressed this way.
    Column(ColumnRef),

    Operator(OperatorApplication),

    List(Vec<Expr>),

    /// Map literal with static keys.
    Map(Vec<(String, Expr)>),

    ScalarFnCall(ScalarFnCall),

    AggregateFnCall(AggregateFnCall),

    Case(Case),

    /// Output name attached to a projected expression.
    Aliased(AliasedExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyAccess {
    pub base: Box<Expr>,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnRef {
    pub var: VarId,
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorApplication {
    pub operator: Operator,
    pub operands: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFnCall {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateFnCall {
    pub name: String,
    pub args: Vec<Expr>,
    pub distinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub expr: Option<Box<Expr>>,
    pub when_then: Vec<(Expr, Expr)>,
    pub else_expr: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasedExpr {
    pub name: String,
    pub expr: Box<Expr>,
}

pub const AGGREGATE_FUNCTIONS: &[&str] = &["count", "sum", "avg", "min", "max", "collect"];

pub fn is_aggregate_function(name: &str) -> bool {
    AGGREGATE_FUNCTIONS
        .iter()
        .any(|agg| agg.eq_ignore_ascii_case(name))
}

impl Expr {
    pub fn binary(operator: Operator, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Operator(OperatorApplication {
            operator,
            operands: vec![lhs, rhs],
        })
    }

    pub fn eq(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(Operator::Equal, lhs, rhs)
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(Operator::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Expr {
        Expr::binary(Operator::Or, lhs, rhs)
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::Literal(Literal::Boolean(value))
    }

    pub fn column(var: VarId, table: &str, column: &str) -> Expr {
        Expr::Column(ColumnRef {
            var,
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Conjunction of `conditions`; `None` when empty.
    pub fn and_all(conditions: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        conditions.into_iter().reduce(Expr::and)
    }

    /// `existing AND condition`, or just `condition`.
    pub fn conjoin(existing: Option<Expr>, condition: Expr) -> Expr {
        match existing {
            Some(existing) => Expr::and(existing, condition),
            None => condition,
        }
    }

    /// The operands of a top-level `AND` chain, flattened.
    pub fn into_conjuncts(self) -> Vec<Expr> {
        match self {
            Expr::Operator(app) if app.operator == Operator::And => app
                .operands
                .into_iter()
                .flat_map(Expr::into_conjuncts)
                .collect(),
            other => vec![other],
        }
    }

    /// The expression without its output-name wrapper.
    pub fn unaliased(&self) -> &Expr {
        match self {
            Expr::Aliased(aliased) => aliased.expr.unaliased(),
            other => other,
        }
    }

    pub fn as_variable(&self) -> Option<VarId> {
        match self {
            Expr::Variable(id) => Some(*id),
            _ => None,
        }
    }

    /// Distinct variables referenced anywhere in the tree, in order of appearance.
    pub fn variables(&self) -> Vec<VarId> {
        let mut collector = VariableCollector::default();
        walk_expression(self, &mut collector);
        collector.vars
    }

    pub fn contains_aggregate(&self) -> bool {
        let mut detector = AggregateDetector::default();
        walk_expression(self, &mut detector);
        detector.found
    }

    /// Number of times `var` is referenced in the tree.
    pub fn count_references(&self, var: VarId) -> usize {
        let mut counter = ReferenceCounter { var, count: 0 };
        walk_expression(self, &mut counter);
        counter.count
    }
}

#[derive(Default)]
struct VariableCollector {
    vars: Vec<VarId>,
}

impl ExpressionVisitor for VariableCollector {
    fn visit_variable(&mut self, var: VarId) {
        if !self.vars.contains(&var) {
            self.vars.push(var);
        }
    }

    fn visit_column(&mut self, column: &ColumnRef) {
        if !self.vars.contains(&column.var) {
            self.vars.push(column.var);
        }
    }
}

#[derive(Default)]
struct AggregateDetector {
    found: bool,
}

impl ExpressionVisitor for AggregateDetector {
    fn visit_aggregate_fn(&mut self, _call: &AggregateFnCall) {
        self.found = true;
    }
}

struct ReferenceCounter {
    var: VarId,
    count: usize,
}

impl ExpressionVisitor for ReferenceCounter {
    fn visit_variable(&mut self, var: VarId) {
        if var == self.var {
            self.count += 1;
        }
    }
}
