/// Graph mapping configuration.
///
/// Loads the node/edge to table mapping from YAML and validates its structure
/// before handing out a read-only [`SchemaMapping`]:
///
/// - every node table is mapped once and has at least one id column
/// - hop column lists are non-empty and pairwise equal in length
/// - consecutive hops of a path chain through a shared table
use super::errors::GraphSchemaError;
use super::schema_mapping::{ImplementationEdge, ImplementationNode, SchemaMapping, TraversalHop};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphMappingConfig {
    #[serde(default)]
    pub nodes: Vec<ImplementationNode>,
    #[serde(default)]
    pub edges: Vec<ImplementationEdge>,
}

impl GraphMappingConfig {
    /// Load mapping configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, GraphSchemaError> {
        let contents = fs::read_to_string(path).map_err(|e| GraphSchemaError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse mapping configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GraphSchemaError> {
        serde_yaml::from_str(yaml).map_err(|e| GraphSchemaError::ConfigParseError {
            error: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<(), GraphSchemaError> {
        if self.nodes.is_empty() {
            return Err(GraphSchemaError::invalid(
                "Mapping must contain at least one node definition",
            ));
        }

        let mut seen_tables = HashSet::new();
        for node in &self.nodes {
            if !seen_tables.insert(node.table.as_str()) {
                return Err(GraphSchemaError::invalid(format!(
                    "Node table '{}' is mapped more than once",
                    node.table
                )));
            }
            if node.labels.is_empty() {
                return Err(GraphSchemaError::invalid(format!(
                    "Node table '{}' has no labels",
                    node.table
                )));
            }
            if node.id_columns.is_empty() {
                return Err(GraphSchemaError::invalid(format!(
                    "Node table '{}' has no id columns",
                    node.table
                )));
            }
        }

        for edge in &self.edges {
            if edge.paths.is_empty() {
                return Err(GraphSchemaError::invalid(format!(
                    "Edge '{}' has no traversal paths",
                    edge.label
                )));
            }
            for path in &edge.paths {
                if path.hops.is_empty() {
                    return Err(GraphSchemaError::invalid(format!(
                        "Edge '{}' has a traversal path without hops",
                        edge.label
                    )));
                }
                for hop in &path.hops {
                    validate_hop(&edge.label, hop)?;
                }
                for pair in path.hops.windows(2) {
                    if pair[0].destination_table != pair[1].source_table {
                        return Err(GraphSchemaError::invalid(format!(
                            "Edge '{}': hop ending at '{}' does not chain into hop starting at '{}'",
                            edge.label, pair[0].destination_table, pair[1].source_table
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate and convert into the read-only lookup structure.
    pub fn into_mapping(self) -> Result<SchemaMapping, GraphSchemaError> {
        self.validate()?;
        log::info!(
            "Loaded graph mapping: {} node tables, {} edges",
            self.nodes.len(),
            self.edges.len()
        );
        Ok(SchemaMapping::new(self.nodes, self.edges))
    }
}

fn validate_hop(label: &str, hop: &TraversalHop) -> Result<(), GraphSchemaError> {
    let source_arity = hop.source_columns.len();
    if source_arity == 0 || source_arity != hop.join_table_source_columns.len() {
        return Err(GraphSchemaError::invalid(format!(
            "Edge '{}': source columns of '{}' and '{}' differ in length",
            label, hop.source_table, hop.join_table
        )));
    }
    let destination_arity = hop.destination_columns.len();
    if destination_arity == 0 || destination_arity != hop.join_table_destination_columns.len() {
        return Err(GraphSchemaError::invalid(format!(
            "Edge '{}': destination columns of '{}' and '{}' differ in length",
            label, hop.join_table, hop.destination_table
        )));
    }
    Ok(())
}

/// Load, validate and build a mapping from a YAML file.
pub fn load_mapping<P: AsRef<Path>>(path: P) -> Result<SchemaMapping, GraphSchemaError> {
    GraphMappingConfig::from_yaml_file(path)?.into_mapping()
}
