//! relgraph - graph queries over relational storage
//!
//! This crate lowers Cypher-like graph-pattern queries into relational query trees:
//! - Graph-to-table mappings loaded from YAML
//! - Cypher parsing into a stage-list AST
//! - Scope and variable-dependency analysis
//! - Schema resolution, union bubbling and join population
//! - SQL generation

use thiserror::Error;

pub mod config;
pub mod graph_catalog;
pub mod open_cypher_parser;
pub mod query_planner;
pub mod sql_generator;

use config::LoweringConfig;
use graph_catalog::SchemaMapping;
use query_planner::errors::LoweringError;
use sql_generator::errors::RenderError;

/// Any failure along text -> AST -> select tree -> SQL.
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Lowering error: {0}")]
    Lowering(#[from] LoweringError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

/// Parses `cypher`, lowers it against `schema` and renders the SQL text.
pub fn cypher_to_sql(
    cypher: &str,
    schema: &SchemaMapping,
    config: &LoweringConfig,
) -> Result<String, TranslationError> {
    let query = open_cypher_parser::parse_query(cypher).map_err(LoweringError::from)?;
    let lowered = query_planner::lower_with_config(&query, schema, config)?;
    Ok(sql_generator::generate_sql(&lowered, config)?)
}
