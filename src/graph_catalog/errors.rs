//! # Graph Schema Error Types
//!
//! Errors raised while loading and validating a graph-to-table mapping.
//! Lookups on an already-loaded [`SchemaMapping`](super::SchemaMapping) never fail;
//! an empty result is reported by the lowering pipeline instead.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GraphSchemaError {
    #[error("Failed to read configuration file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse configuration: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl GraphSchemaError {
    pub fn invalid(message: impl Into<String>) -> Self {
        GraphSchemaError::InvalidConfig {
            message: message.into(),
        }
    }
}
