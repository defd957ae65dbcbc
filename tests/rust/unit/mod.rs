//! Unit tests - public API behavior that needs no mapping file
//!
//! Parser robustness and configuration loading, exercised through the
//! crate's public surface only.

mod config_tests;
mod parser_robustness_tests;
