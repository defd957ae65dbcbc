pub mod config;
pub mod errors;
pub mod schema_mapping;

pub use config::{load_mapping, GraphMappingConfig};
pub use errors::GraphSchemaError;
pub use schema_mapping::{
    ImplementationEdge, ImplementationNode, RowRestriction, SchemaMapping, TraversalHop,
    TraversalPath,
};
