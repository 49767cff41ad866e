// logtail - lib.rs
//
// Library entry point, exposing every module for integration testing and
// for embedding the tail reader or aggregator in other programs.
//
// The command-line front end lives in `main.rs`.

pub mod app;
pub mod core;
pub mod platform;
pub mod util;
