//! Command implementations for the petsmoke CLI.
//!
//! Each submodule implements one subcommand and returns the process exit code.

pub mod doctor;
pub mod run;
pub mod smoke;
pub mod start_and_call;
pub mod wait;
