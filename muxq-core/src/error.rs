// ============================================================================
// muxq-core/src/error.rs
// ============================================================================
//
// ERROR HANDLING: Custom Error Types for muxq-core
//
// This module defines the error types used throughout the muxq-core library.
// Per-job failures (configuration, launch, runtime) are NOT errors of the
// engine: they are recorded on the job as a `FailureReason`. `CoreError`
// covers everything that makes an API call itself fail.
//
// KEY COMPONENTS:
// - CoreError: Main error enum with variants for the different failure modes
// - CoreResult: Type alias for Result with CoreError

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Custom error type for muxq-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid job '{title}': {reason}")]
    InvalidJob { title: String, reason: String },

    #[error("Batch contains no jobs")]
    EmptyBatch,

    #[error("Output directory is not set")]
    OutputDirNotSet,

    #[error("Failed to create output directory '{}': {source}", path.display())]
    OutputDirCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Worker binary not found: {}", .0.display())]
    WorkerNotFound(PathBuf),

    #[error("Failed to start worker '{}': {source}", program.display())]
    WorkerLaunch {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ffprobe failed for '{}': {message}", path.display())]
    Probe { path: PathBuf, message: String },

    #[error("Batch queue is no longer running")]
    QueueClosed,

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for muxq-core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Maps a spawn failure to the matching error variant.
pub(crate) fn launch_error(program: &std::path::Path, source: io::Error) -> CoreError {
    if source.kind() == io::ErrorKind::NotFound {
        CoreError::WorkerNotFound(program.to_path_buf())
    } else {
        CoreError::WorkerLaunch {
            program: program.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_launch_error_not_found() {
        let err = launch_error(
            Path::new("/opt/missing/ffmpeg"),
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(matches!(err, CoreError::WorkerNotFound(_)));
        assert_eq!(err.to_string(), "Worker binary not found: /opt/missing/ffmpeg");
    }

    #[test]
    fn test_launch_error_permission() {
        let err = launch_error(
            Path::new("ffmpeg"),
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, CoreError::WorkerLaunch { .. }));
        assert!(err.to_string().contains("denied"));
    }
}
