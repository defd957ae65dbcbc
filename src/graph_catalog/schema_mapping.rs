//! Read-only graph-to-table mapping.
//!
//! A node label maps to one or more [`ImplementationNode`]s (tables), an edge label
//! to an [`ImplementationEdge`] made of [`TraversalPath`]s, each a chain of
//! [`TraversalHop`]s through a join table. The mapping is immutable once built and
//! can be shared between concurrent translations.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// One `column = value` restriction every row of a node table must satisfy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRestriction {
    pub column: String,
    pub value: String,
}

/// A concrete table storing graph nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationNode {
    pub labels: Vec<String>,
    pub table: String,
    pub id_columns: Vec<String>,
    #[serde(default)]
    pub attribute_columns: BTreeMap<String, String>,
    #[serde(default)]
    pub row_restrictions: Vec<RowRestriction>,
}

impl ImplementationNode {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Physical column for a graph property, if the table stores it.
    pub fn attribute_column(&self, key: &str) -> Option<&str> {
        self.attribute_columns.get(key).map(String::as_str)
    }
}

/// One join step: `source_table.source_columns = join_table.join_table_source_columns`
/// and `join_table.join_table_destination_columns = destination_table.destination_columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalHop {
    pub source_table: String,
    pub source_columns: Vec<String>,
    pub join_table: String,
    pub join_table_source_columns: Vec<String>,
    pub join_table_destination_columns: Vec<String>,
    pub destination_table: String,
    pub destination_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalPath {
    pub hops: Vec<TraversalHop>,
}

impl TraversalPath {
    pub fn source_table(&self) -> Option<&str> {
        self.hops.first().map(|h| h.source_table.as_str())
    }

    pub fn destination_table(&self) -> Option<&str> {
        self.hops.last().map(|h| h.destination_table.as_str())
    }

    pub fn is_self_referencing(&self) -> bool {
        self.source_table().is_some() && self.source_table() == self.destination_table()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementationEdge {
    pub label: String,
    pub paths: Vec<TraversalPath>,
}

/// The loaded mapping. Construct through [`SchemaMapping::new`] or
/// [`GraphMappingConfig`](super::config::GraphMappingConfig).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaMapping {
    nodes: Vec<ImplementationNode>,
    edges: Vec<ImplementationEdge>,
    node_index_by_table: HashMap<String, usize>,
}

impl SchemaMapping {
    pub fn new(nodes: Vec<ImplementationNode>, edges: Vec<ImplementationEdge>) -> Self {
        let node_index_by_table = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.table.clone(), i))
            .collect();
        SchemaMapping {
            nodes,
            edges,
            node_index_by_table,
        }
    }

    pub fn nodes(&self) -> &[ImplementationNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[ImplementationEdge] {
        &self.edges
    }

    /// Tables whose rows carry every label in `labels`. Labels are conjunctive:
    /// `(a:Person:Employee)` only matches tables mapped under both labels.
    /// An empty label set matches every node table.
    pub fn tables_for_labels(&self, labels: &[String]) -> Vec<&ImplementationNode> {
        self.nodes
            .iter()
            .filter(|node| labels.iter().all(|l| node.has_label(l)))
            .collect()
    }

    /// Edges usable for a relationship pattern with `labels`. Relationship labels
    /// are alternatives (`[:A|B]`), so any edge with one of them qualifies.
    /// An empty label set matches every edge.
    pub fn edges_for_labels(&self, labels: &[String]) -> Vec<&ImplementationEdge> {
        self.edges
            .iter()
            .filter(|edge| labels.is_empty() || labels.iter().any(|l| *l == edge.label))
            .collect()
    }

    pub fn node_by_table(&self, table: &str) -> Option<&ImplementationNode> {
        self.node_index_by_table
            .get(table)
            .and_then(|i| self.nodes.get(*i))
    }

    /// Endpoint tables a node can sit on for a relationship with `labels`.
    /// `as_source` / `as_destination` select which path ends count.
    pub fn endpoint_tables(
        &self,
        labels: &[String],
        as_source: bool,
        as_destination: bool,
    ) -> BTreeSet<String> {
        let mut tables = BTreeSet::new();
        for edge in self.edges_for_labels(labels) {
            for path in &edge.paths {
                if as_source {
                    if let Some(t) = path.source_table() {
                        tables.insert(t.to_string());
                    }
                }
                if as_destination {
                    if let Some(t) = path.destination_table() {
                        tables.insert(t.to_string());
                    }
                }
            }
        }
        tables
    }

    /// Widest id column list among `tables`.
    pub fn id_arity(&self, tables: &[String]) -> usize {
        tables
            .iter()
            .filter_map(|t| self.node_by_table(t))
            .map(|n| n.id_columns.len())
            .max()
            .unwrap_or(1)
    }
}
