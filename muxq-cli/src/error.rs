// ============================================================================
// muxq-cli/src/error.rs
// ============================================================================
//
// CLI ERROR HANDLING: Error types and utilities for the CLI
//
// The CLI reuses the core's error type so that errors from the engine and
// from the CLI's own file handling travel the same way up to `main`, which
// prints them and exits with status 1.

use muxq_core::{CoreError, CoreResult};

use std::fmt;

/// Type alias for CLI results using CoreError.
pub type CliResult<T> = CoreResult<T>;

/// Prefixes an error with what the CLI was doing when it happened.
pub trait CliErrorContext<T> {
    fn cli_context(self, context: impl fmt::Display) -> CliResult<T>;

    /// Like `cli_context`, building the message only on error.
    fn cli_with_context<C: fmt::Display>(self, context: impl FnOnce() -> C) -> CliResult<T>;
}

impl<T, E: Into<CoreError>> CliErrorContext<T> for Result<T, E> {
    fn cli_context(self, context: impl fmt::Display) -> CliResult<T> {
        self.map_err(|e| with_context(&context, e.into()))
    }

    fn cli_with_context<C: fmt::Display>(self, context: impl FnOnce() -> C) -> CliResult<T> {
        self.map_err(|e| with_context(&context(), e.into()))
    }
}

fn with_context(context: &dyn fmt::Display, error: CoreError) -> CoreError {
    CoreError::OperationFailed(format!("{context}: {error}"))
}

/// Creates a CLI error with a formatted message.
#[macro_export]
macro_rules! cli_error {
    ($($arg:tt)*) => {
        $crate::muxq_core::CoreError::OperationFailed(format!($($arg)*))
    };
}
