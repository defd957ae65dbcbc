//! Stage-list AST for the supported Cypher subset.
//!
//! A query is an ordered list of `MATCH` / `WITH` / `RETURN` stages. Every stage
//! and pattern element carries `position`, its byte offset in the query text.
//! Positions identify clauses and derive variable names downstream, so trees
//! built by hand must keep them unique per element kind.

use std::fmt;

#[derive(Debug, PartialEq, Clone)]
pub struct CypherQuery<'a> {
    pub stages: Vec<Stage<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Stage<'a> {
    Match(MatchClause<'a>),
    With(WithClause<'a>),
    Return(ReturnClause<'a>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct MatchClause<'a> {
    pub position: usize,
    pub optional: bool,
    /// Comma separated pattern branches, `MATCH (a)--(b), (c)`.
    pub path_patterns: Vec<PathPattern<'a>>,
    pub where_clause: Option<WhereClause<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PathPattern<'a> {
    pub position: usize,
    /// `p` in `p = (a)-->(b)`
    pub path_variable: Option<&'a str>,
    pub start: NodePattern<'a>,
    pub chain: Vec<ConnectedPattern<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ConnectedPattern<'a> {
    pub relationship: RelationshipPattern<'a>,
    pub node: NodePattern<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NodePattern<'a> {
    pub position: usize,
    pub name: Option<&'a str>,
    pub labels: Vec<&'a str>,
    pub properties: Vec<PropertyKVPair<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RelationshipPattern<'a> {
    pub position: usize,
    pub name: Option<&'a str>,
    pub labels: Vec<&'a str>,
    pub direction: Direction,
    pub variable_length: Option<VariableLengthSpec>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Direction {
    /// `(a)-->(b)`
    Outgoing,
    /// `(a)<--(b)`
    Incoming,
    /// `(a)--(b)`
    Either,
}

/// `*`, `*k`, `*min..max` and the open-ended forms.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct VariableLengthSpec {
    pub min_hops: Option<u32>,
    pub max_hops: Option<u32>,
}

impl VariableLengthSpec {
    pub fn fixed(hops: u32) -> Self {
        VariableLengthSpec {
            min_hops: Some(hops),
            max_hops: Some(hops),
        }
    }

    /// Hop count when the spec pins one exact length.
    pub fn fixed_length(&self) -> Option<u32> {
        match (self.min_hops, self.max_hops) {
            (Some(min), Some(max)) if min == max => Some(min),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyKVPair<'a> {
    pub key: &'a str,
    pub value: Expression<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WhereClause<'a> {
    pub position: usize,
    pub conditions: Expression<'a>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ProjectionItem<'a> {
    pub position: usize,
    pub expression: Expression<'a>,
    pub alias: Option<&'a str>,
    /// Source text of the expression, the output name of unaliased `RETURN` items.
    pub text: &'a str,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OrderByItem<'a> {
    pub expression: Expression<'a>,
    pub order: SortOrder,
}

#[derive(Debug, PartialEq, Clone)]
pub struct WithClause<'a> {
    pub position: usize,
    pub distinct: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub order_by: Vec<OrderByItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
    pub where_clause: Option<WhereClause<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ReturnClause<'a> {
    pub position: usize,
    pub distinct: bool,
    pub items: Vec<ProjectionItem<'a>>,
    pub order_by: Vec<OrderByItem<'a>>,
    pub skip: Option<Expression<'a>>,
    pub limit: Option<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression<'a> {
    Literal(Literal<'a>),
    Variable(&'a str),
    /// `$name`
    Parameter(&'a str),
    List(Vec<Expression<'a>>),
    Map(Vec<PropertyKVPair<'a>>),
    PropertyAccess(PropertyAccess<'a>),
    OperatorApplication(OperatorApplication<'a>),
    FunctionCall(FunctionCall<'a>),
    Case(Case<'a>),
    /// Only valid as the argument of `count(*)`.
    Star,
}

#[derive(Debug, PartialEq, Clone)]
pub struct PropertyAccess<'a> {
    pub base: Box<Expression<'a>>,
    pub key: &'a str,
}

#[derive(Debug, PartialEq, Clone)]
pub struct OperatorApplication<'a> {
    pub operator: Operator,
    pub operands: Vec<Expression<'a>>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct FunctionCall<'a> {
    pub name: &'a str,
    pub args: Vec<Expression<'a>>,
    pub distinct: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Case<'a> {
    /// `CASE x WHEN ...` form; `None` for `CASE WHEN cond ...`
    pub expr: Option<Box<Expression<'a>>>,
    pub when_then: Vec<(Expression<'a>, Expression<'a>)>,
    pub else_expr: Option<Box<Expression<'a>>>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal<'a> {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(&'a str),
    Null,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Operator {
    // binary
    Addition,         // +
    Subtraction,      // -
    Multiplication,   // *
    Division,         // /
    ModuloDivision,   // %
    Exponentiation,   // ^
    Equal,            // =
    NotEqual,         // <>
    LessThan,         // <
    GreaterThan,      // >
    LessThanEqual,    // <=
    GreaterThanEqual, // >=
    RegexMatch,       // =~
    And,
    Or,
    Xor,
    In,
    StartsWith,
    EndsWith,
    Contains,
    // unary
    Not,
    // post fix
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::LessThan
                | Operator::GreaterThan
                | Operator::LessThanEqual
                | Operator::GreaterThanEqual
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::ModuloDivision => "%",
            Operator::Exponentiation => "^",
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessThanEqual => "<=",
            Operator::GreaterThanEqual => ">=",
            Operator::RegexMatch => "=~",
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Xor => "XOR",
            Operator::In => "IN",
            Operator::StartsWith => "STARTS WITH",
            Operator::EndsWith => "ENDS WITH",
            Operator::Contains => "CONTAINS",
            Operator::Not => "NOT",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        };
        write!(f, "{}", s)
    }
}
