use thiserror::Error;

use crate::query_planner::errors::LoweringError;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RenderError {
    #[error("Cannot render expression: {0}")]
    InvalidExpression(String),

    #[error("No subquery supplies `{0}`")]
    MissingSubquery(String),

    #[error("Select has no FROM items (every stage must read a table or a subquery)")]
    EmptyFromClause,

    #[error("Table '{0}' is not part of the schema mapping")]
    UnknownTable(String),

    #[error(transparent)]
    Lowering(#[from] LoweringError),
}

impl RenderError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        RenderError::InvalidExpression(reason.into())
    }
}
