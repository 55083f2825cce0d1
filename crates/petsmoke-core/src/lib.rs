//! petsmoke-core - Core library for petsmoke
//!
//! Launches an external server process, waits for it to answer its health
//! endpoint, runs create/read/delete smoke checks against it and always
//! stops it again:
//!
//! - **command**: structured command specs and one-shot execution
//! - **supervisor**: start / liveness / graceful stop of the server process
//! - **readiness**: bounded health polling with an injectable clock
//! - **smoke**: the fixed GET/POST/GET/DELETE pets script
//! - **cli_check**: external CLI integration call
//! - **project**: npm install/build steps
//! - **config**: per-invocation run configuration
//! - **orchestrator**: stage sequencing with guaranteed cleanup

pub mod cli_check;
pub mod command;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod project;
pub mod readiness;
pub mod smoke;
pub mod supervisor;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::RunConfig;
pub use error::{Error, FailureClass, Result};
pub use orchestrator::{Orchestrator, RunReport, Stage};
