//! Application orchestration.
//!
//! Runtime wiring and lifecycle management for the monitoring agent.

mod runtime;

pub use runtime::{build_runtime, run, run_once, run_with_shutdown, Runtime};
