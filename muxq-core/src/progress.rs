//! Progress parsing and batch-wide aggregation.
//!
//! `parse_progress` turns one chunk of worker diagnostic output into a
//! reading. It is stateless: every chunk is parsed on its own, and the only
//! context is the job's expected duration.
//!
//! `aggregate` computes the batch-wide percentage from the jobs that are
//! currently running.

use log::trace;

use crate::job::Job;
use crate::utils::parse_ffmpeg_time;

/// Marker ffmpeg prints before the elapsed output time.
const TIME_MARKER: &str = "time=";

/// Result of parsing one output chunk.
///
/// `NoUpdate` means the chunk carried no elapsed-time marker. It is distinct
/// from job failure and must never be applied to a job's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressReading {
    NoUpdate,
    Percent(u8),
}

/// Parses a chunk of worker output against the job's expected duration.
///
/// The first `time=HH:MM:SS.fraction` marker in the chunk wins. With a known
/// duration the elapsed time is converted to an integer percentage clamped to
/// 0..=100; with an unknown duration (0) every marker reads as 0%.
#[must_use]
pub fn parse_progress(chunk: &str, expected_duration: u64) -> ProgressReading {
    let Some(elapsed) = find_elapsed_seconds(chunk) else {
        return ProgressReading::NoUpdate;
    };

    if expected_duration == 0 {
        return ProgressReading::Percent(0);
    }

    let percent = (elapsed.saturating_mul(100) / expected_duration).min(100);
    trace!("Parsed elapsed {elapsed}s of {expected_duration}s -> {percent}%");
    ProgressReading::Percent(percent as u8)
}

fn find_elapsed_seconds(chunk: &str) -> Option<u64> {
    chunk.match_indices(TIME_MARKER).find_map(|(idx, _)| {
        let rest = &chunk[idx + TIME_MARKER.len()..];
        let end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == ':' || c == '.'))
            .unwrap_or(rest.len());
        parse_ffmpeg_time(&rest[..end])
    })
}

/// Mean progress of the given running jobs, each clamped to 0..=100.
///
/// Returns 0 when there are no running jobs.
#[must_use]
pub fn aggregate<'a, I>(running: I) -> u8
where
    I: IntoIterator<Item = &'a Job>,
{
    let (sum, count) = running.into_iter().fold((0u64, 0u64), |(sum, count), job| {
        let clamped = job.progress().clamp(0, 100) as u64;
        (sum + clamped, count + 1)
    });

    if count == 0 { 0 } else { (sum / count) as u8 }
}
