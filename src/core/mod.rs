// logtail - core/mod.rs
//
// Core retrieval layer.
// Dependencies: standard library, walkdir, chrono/serde for the
// data model.
// Must NOT depend on: app, platform, or any network crate.

pub mod filter;
pub mod listing;
pub mod model;
pub mod path;
pub mod scan;
pub mod source;
pub mod tail;
