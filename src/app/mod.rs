// logtail - app/mod.rs
//
// Application layer: fan-out, peer registry, transport and HTTP surfaces.
// Dependencies: core, platform, util.

pub mod aggregate;
pub mod api_error;
pub mod node_api;
pub mod primary_api;
pub mod registry;
pub mod server;
pub mod transport;
