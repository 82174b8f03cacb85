//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific command.

/// `run`: submits the batch to the engine and renders it until it finishes.
pub mod run;

/// `plan`: prints the worker command lines without running anything.
pub mod plan;
