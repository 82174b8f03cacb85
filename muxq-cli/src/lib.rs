// muxq-cli/src/lib.rs
//
// Library portion of the muxq CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod progress;

// Used by the cli_error! macro.
pub use muxq_core;

// Re-export items needed by the binary or integration tests
pub use cli::{BatchArgs, Cli, Commands, PlanArgs, RunArgs};
pub use commands::plan::run_plan;
pub use commands::run::{log_dir_for, run_batch};
pub use error::{CliErrorContext, CliResult};
