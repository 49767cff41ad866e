// logtail - platform/mod.rs
//
// Platform abstraction layer: config directory resolution and config.toml
// loading.
// Dependencies: core (model types, TailConfig), util, directories, toml, serde.
// Must NOT depend on: app.

pub mod config;
