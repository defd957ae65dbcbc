use thiserror::Error;

use crate::open_cypher_parser::errors::OpenCypherParsingError;

pub type LoweringResult<T> = Result<T, LoweringError>;

/// Failures of the lowering pipeline. Every variant aborts the translation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoweringError {
    #[error("Variable `{0}` is not defined")]
    UndefinedVariable(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("No table is mapped for labels [{}]", .0.join(", "))]
    NoTableForLabels(Vec<String>),

    #[error("No edge connects the endpoint tables for relationship labels [{}]", .0.join(", "))]
    NoEdgeFound(Vec<String>),

    #[error("More than one edge matches relationship labels [{}]", .0.join(", "))]
    AmbiguousEdge(Vec<String>),

    #[error("Query expands into {count} union combinations, the limit is {limit}")]
    TooManyUnionCombinations { count: usize, limit: usize },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Internal error: {0}")]
    BugFound(String),
}

impl LoweringError {
    pub fn bug(message: impl Into<String>) -> Self {
        LoweringError::BugFound(message.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        LoweringError::InvalidExpression(reason.into())
    }

    /// True for invariant violations inside the pipeline, false for errors
    /// caused by the query or the mapping.
    pub fn is_internal(&self) -> bool {
        matches!(self, LoweringError::BugFound(_))
    }
}

impl From<OpenCypherParsingError<'_>> for LoweringError {
    fn from(err: OpenCypherParsingError<'_>) -> Self {
        LoweringError::Parse(err.to_string())
    }
}
