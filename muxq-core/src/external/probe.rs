// ============================================================================
// muxq-core/src/external/probe.rs
// ============================================================================
//
// DURATION PROBE: Container Duration Lookup via ffprobe
//
// Used by collaborators to fill in a job's expected duration when the
// submitter does not know it. The engine itself never probes: an unknown
// duration (0) simply keeps progress at 0 until the job completes.

use std::path::Path;

use ffprobe::{FfProbeError, ffprobe};

use crate::error::{CoreError, CoreResult};

/// Returns the container duration of `path` in whole seconds (floored).
pub fn probe_duration(path: &Path) -> CoreResult<u64> {
    log::debug!("Running ffprobe for duration on: {}", path.display());

    let metadata = ffprobe(path).map_err(|err| {
        log::error!("ffprobe failed on {}: {:?}", path.display(), err);
        map_ffprobe_error(path, err)
    })?;

    let seconds = metadata
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| CoreError::Probe {
            path: path.to_path_buf(),
            message: "no container duration reported".to_string(),
        })?;

    duration_to_secs(seconds).ok_or_else(|| CoreError::Probe {
        path: path.to_path_buf(),
        message: format!("invalid duration {seconds}"),
    })
}

fn duration_to_secs(seconds: f64) -> Option<u64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds.floor() as u64)
}

fn map_ffprobe_error(path: &Path, err: FfProbeError) -> CoreError {
    let message = match err {
        FfProbeError::Io(io_err) => format!("could not run ffprobe: {io_err}"),
        FfProbeError::Status(output) => format!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        FfProbeError::Deserialize(err) => format!("unreadable ffprobe output: {err}"),
        other => format!("unknown ffprobe error: {other:?}"),
    };
    CoreError::Probe {
        path: path.to_path_buf(),
        message,
    }
}
