use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use validator::Validate;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Translator configuration with validation
#[derive(Clone, Debug, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default)]
pub struct LoweringConfig {
    /// Upper bound on the union branches ambiguous labels may expand into
    #[validate(range(
        min = 1,
        max = 100000,
        message = "Max union combinations must be between 1 and 100000"
    ))]
    pub max_union_combinations: usize,

    /// Render `UNION ALL` between branches; plain `UNION` otherwise
    pub union_all: bool,

    /// Prefix of generated subquery names
    #[validate(length(min = 1, message = "Subquery prefix cannot be empty"))]
    pub subquery_prefix: String,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        Self {
            max_union_combinations: 256,
            union_all: true,
            subquery_prefix: "SUB_".to_string(),
        }
    }
}

impl LoweringConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            max_union_combinations: parse_env_var("RELGRAPH_MAX_UNION_COMBINATIONS", "256")?,
            union_all: parse_env_var("RELGRAPH_UNION_ALL", "true")?,
            subquery_prefix: env::var("RELGRAPH_SUBQUERY_PREFIX")
                .unwrap_or_else(|_| "SUB_".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file; missing fields keep their defaults
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}
