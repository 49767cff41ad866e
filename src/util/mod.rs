// logtail - util/mod.rs
//
// Utility modules: error types, named constants, logging setup, formatting.
// No dependencies on core, app, or platform layers.

pub mod constants;
pub mod error;
pub mod format;
pub mod logging;
