//! Scope and variable-dependency analysis.
//!
//! One top-to-bottom walk over the query stages assigns every stage a
//! [`ClauseId`], creates the query's variables in the arena and records, per
//! stage, the variables it uses, the scope it sees and the relationships it
//! declares. The result, [`VarDependencies`], is read-only for every later pass.

mod available_variables;
mod clause_id;
mod dependencies;

pub use available_variables::AvailableVariables;
pub use clause_id::{ClauseId, ClauseKind};
pub use dependencies::{analyze_dependencies, ClauseInfo, Relationship, StageRole, VarDependencies};
