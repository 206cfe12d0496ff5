//! sqlforge library crate — re-exports for integration tests.
//!
//! The primary interface is the `sqlforge` binary. This lib.rs exposes
//! internal modules so that integration tests can exercise the map-file
//! merger, the build orchestrator, and the config layer directly
//! without going through the CLI.

pub mod build;
pub mod config;
pub mod doctor;
pub mod engine;
pub mod error;
pub mod merge;
pub mod report;
pub mod telemetry;
