// ============================================================================
// muxq-core/src/external/mod.rs
// ============================================================================
//
// EXTERNAL TOOLS: Interactions with the Worker Binary and ffprobe
//
// This module encapsulates everything that touches the external media tools:
// building the worker's argument vector, spawning and monitoring worker
// processes, and probing source durations.
//
// KEY COMPONENTS:
// - command: OutputFormat, title sanitizing and WorkerInvocation construction
// - worker: WorkerSpawner/WorkerHandle traits and the tokio-based TokioSpawner
// - probe: container duration lookup through the ffprobe crate
// - mocks: scripted spawner for tests (test builds or the "test-mocks" feature)
//
// The supervisor only ever talks to the `WorkerSpawner` trait, so tests can
// substitute the scripted spawner for real processes.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{CoreResult, launch_error};

// ============================================================================
// SUBMODULES
// ============================================================================

pub mod command;
pub mod probe;
pub mod worker;

#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use command::{OutputFormat, WorkerInvocation, build_invocation, sanitize_title};
pub use probe::probe_duration;
pub use worker::{
    OutputStream, TokioSpawner, TokioWorker, WorkerEventSender, WorkerExit, WorkerHandle,
    WorkerSignal, WorkerSpawner,
};

// ============================================================================
// WORKER LOCATION
// ============================================================================

const WORKER_NAME: &str = "ffmpeg";

/// Directory containing the running executable, if it can be determined.
#[must_use]
pub fn executable_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// The worker binary expected alongside the application, e.g.
/// `/opt/muxq/ffmpeg` or `C:\muxq\ffmpeg.exe`.
///
/// Falls back to a bare `ffmpeg`, resolved through `PATH` at spawn time,
/// when the executable's directory is unknown.
#[must_use]
pub fn default_worker_path() -> PathBuf {
    let file_name = format!("{WORKER_NAME}{}", std::env::consts::EXE_SUFFIX);
    match executable_dir() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

// ============================================================================
// DEPENDENCY CHECKING
// ============================================================================

/// Checks that the worker binary exists and can be started.
///
/// Runs `<worker> -version` with its output discarded. Only a failure to
/// start is an error; the exit status is not inspected.
pub fn check_worker(worker: &Path) -> CoreResult<()> {
    let result = Command::new(worker)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match result {
        Ok(_) => {
            log::debug!("Found worker binary: {}", worker.display());
            Ok(())
        }
        Err(e) => Err(launch_error(worker, e)),
    }
}
