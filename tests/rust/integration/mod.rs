//! Integration tests - translate queries end to end against YAML mappings
//!
//! Every test writes its mapping to a temporary file and goes through the
//! same loading path the CLI uses.

mod common;
mod mapping_loading_tests;
mod translation_tests;
mod union_tests;
