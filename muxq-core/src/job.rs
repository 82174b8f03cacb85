// ============================================================================
// muxq-core/src/job.rs
// ============================================================================
//
// JOBS: The Unit of Work and Its State Machine
//
// A `JobSpec` is what a collaborator submits: up to two source paths, a title
// and the expected duration. A `Job` wraps the spec with the monotonic state
// machine; the supervisor keys jobs by `JobId`
//
//     Pending --start--> Running --succeed--> Succeeded
//                        Running --fail-----> Failed
//     Pending --fail (cancelled, or output dir unusable)--> Failed
//
// Terminal states are final. Progress and failure are kept apart: the job's
// integer progress reads -1 only once it is Failed, and progress readings
// arriving after a terminal transition are ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::utils;

/// Progress value reported for a job that ended in failure.
pub const PROGRESS_FAILED: i32 = -1;

/// Identity of a job, unique for the lifetime of a `BatchQueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One requested remux, as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobSpec {
    /// Video source; `None` or an empty path means "no video input".
    #[serde(default)]
    pub video: Option<PathBuf>,

    /// Audio source; `None` or an empty path means "no audio input".
    #[serde(default)]
    pub audio: Option<PathBuf>,

    /// Used to derive the output filename. Empty titles get a generated one.
    #[serde(default)]
    pub title: String,

    /// Expected duration in seconds. 0 means unknown.
    #[serde(default, alias = "duration")]
    pub expected_duration: u64,
}

impl JobSpec {
    pub fn new<P: Into<PathBuf>>(
        video: Option<P>,
        audio: Option<P>,
        title: impl Into<String>,
        expected_duration: u64,
    ) -> Self {
        Self {
            video: video.map(Into::into),
            audio: audio.map(Into::into),
            title: title.into(),
            expected_duration,
        }
    }

    /// The video source, if present and non-empty.
    #[must_use]
    pub fn video_source(&self) -> Option<&Path> {
        non_empty(self.video.as_deref())
    }

    /// The audio source, if present and non-empty.
    #[must_use]
    pub fn audio_source(&self) -> Option<&Path> {
        non_empty(self.audio.as_deref())
    }

    /// Sources in invocation order: video first, then audio.
    pub fn sources(&self) -> impl Iterator<Item = &Path> {
        self.video_source().into_iter().chain(self.audio_source())
    }

    /// Checks the submission-time invariant: at least one source.
    pub fn validate(&self) -> CoreResult<()> {
        if self.sources().next().is_none() {
            return Err(CoreError::InvalidJob {
                title: self.title.clone(),
                reason: "at least one of video or audio source is required".to_string(),
            });
        }
        Ok(())
    }

    /// Sources that do not exist or are empty files.
    #[must_use]
    pub fn missing_sources(&self) -> Vec<&Path> {
        self.sources()
            .filter(|path| {
                std::fs::metadata(path)
                    .map(|meta| !meta.is_file() || meta.len() == 0)
                    .unwrap_or(true)
            })
            .collect()
    }

    /// Fills in a generated title when the submitted one is blank.
    ///
    /// The generated title is the first source's file stem followed by a
    /// local timestamp, e.g. `episode01_20240601_123045`.
    pub fn ensure_title(&mut self) {
        if !self.title.trim().is_empty() {
            return;
        }
        let stem = self
            .sources()
            .next()
            .and_then(Path::file_stem)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        self.title = format!("{stem}_{}", utils::timestamp());
    }
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

/// Why a job ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Output directory unset or not creatable; no process was spawned.
    Configuration(String),
    /// The worker could not be started, or its monitor lost track of it.
    Launch(String),
    /// The worker exited normally with a non-zero code.
    NonZeroExit(i32),
    /// The worker was terminated by a signal or otherwise abnormally.
    AbnormalTermination(String),
    /// The worker exceeded the wall-clock limit and was terminated.
    TimedOut { after_secs: u64 },
    /// The batch was cancelled before the job could finish.
    Cancelled,
}

impl FailureReason {
    /// Coarse class used in logs: configuration, launch, runtime or cancelled.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            FailureReason::Configuration(_) => "configuration",
            FailureReason::Launch(_) => "launch",
            FailureReason::NonZeroExit(_)
            | FailureReason::AbnormalTermination(_)
            | FailureReason::TimedOut { .. } => "runtime",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Configuration(msg) => write!(f, "configuration error: {msg}"),
            FailureReason::Launch(msg) => write!(f, "launch failed: {msg}"),
            FailureReason::NonZeroExit(code) => write!(f, "exited with code {code}"),
            FailureReason::AbnormalTermination(msg) => write!(f, "terminated abnormally: {msg}"),
            FailureReason::TimedOut { after_secs } => write!(f, "timed out after {after_secs}s"),
            FailureReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed(FailureReason),
}

impl JobState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed(_))
    }
}

/// A submitted job and its progress through the state machine.
#[derive(Debug, Clone)]
pub struct Job {
    spec: JobSpec,
    state: JobState,
    progress: u8,
    failure_recorded: bool,
}

impl Job {
    #[must_use]
    pub fn new(spec: JobSpec) -> Self {
        Self {
            spec,
            state: JobState::Pending,
            progress: 0,
            failure_recorded: false,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.spec.title
    }

    #[must_use]
    pub fn state(&self) -> &JobState {
        &self.state
    }

    #[must_use]
    pub fn failure_recorded(&self) -> bool {
        self.failure_recorded
    }

    /// Progress in the domain `{-1} ∪ [0, 100]`; -1 only once Failed.
    #[must_use]
    pub fn progress(&self) -> i32 {
        match self.state {
            JobState::Failed(_) => PROGRESS_FAILED,
            _ => i32::from(self.progress),
        }
    }

    /// Pending -> Running. Returns `false` if the job was not Pending.
    pub fn start(&mut self) -> bool {
        if self.state != JobState::Pending {
            return false;
        }
        self.state = JobState::Running;
        self.progress = 0;
        true
    }

    /// Applies a parsed percentage. Ignored unless the job is Running.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        self.progress = percent.min(100);
        true
    }

    /// Running -> Succeeded with progress 100. Returns `false` otherwise.
    pub fn succeed(&mut self) -> bool {
        if self.state != JobState::Running {
            return false;
        }
        self.state = JobState::Succeeded;
        self.progress = 100;
        true
    }

    /// Any non-terminal state -> Failed.
    ///
    /// Returns `true` only for the transition that records the failure, so
    /// repeated failure signals for the same process are counted once.
    pub fn fail(&mut self, reason: FailureReason) -> bool {
        if self.failure_recorded || self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Failed(reason);
        self.failure_recorded = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(JobSpec::new(Some("movie.mp4"), Some("movie.m4a"), "Movie", 120))
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = job();
        assert_eq!(job.state(), &JobState::Pending);
        assert_eq!(job.progress(), 0);

        assert!(job.start());
        assert!(job.record_progress(42));
        assert_eq!(job.progress(), 42);

        assert!(job.succeed());
        assert_eq!(job.state(), &JobState::Succeeded);
        assert_eq!(job.progress(), 100);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.start();
        job.succeed();

        assert!(!job.start());
        assert!(!job.record_progress(10));
        assert!(!job.fail(FailureReason::NonZeroExit(1)));
        assert_eq!(job.state(), &JobState::Succeeded);
        assert_eq!(job.progress(), 100);
    }

    #[test]
    fn test_failure_recorded_once() {
        let mut job = job();
        job.start();
        job.record_progress(30);

        assert!(job.fail(FailureReason::Launch("boom".into())));
        assert!(job.failure_recorded());
        assert!(!job.fail(FailureReason::NonZeroExit(1)));
        assert_eq!(job.state(), &JobState::Failed(FailureReason::Launch("boom".into())));
        assert_eq!(job.progress(), PROGRESS_FAILED);

        // Late readings never overwrite the sentinel
        assert!(!job.record_progress(80));
        assert_eq!(job.progress(), PROGRESS_FAILED);
        assert!(!job.succeed());
    }

    #[test]
    fn test_pending_can_be_cancelled() {
        let mut job = job();
        assert!(job.fail(FailureReason::Cancelled));
        assert!(!job.start());
    }

    #[test]
    fn test_cannot_succeed_from_pending() {
        let mut job = job();
        assert!(!job.succeed());
        assert_eq!(job.state(), &JobState::Pending);
    }

    #[test]
    fn test_validate_requires_a_source() {
        assert!(JobSpec::new(Some("v.mp4"), None, "t", 0).validate().is_ok());
        assert!(JobSpec::new(None, Some("a.m4a"), "t", 0).validate().is_ok());

        let err = JobSpec::new(None::<&str>, None, "t", 0).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidJob { .. }));

        // Empty paths count as absent
        let err = JobSpec::new(Some(""), Some(""), "t", 0).validate().unwrap_err();
        assert!(matches!(err, CoreError::InvalidJob { .. }));
    }

    #[test]
    fn test_sources_order_video_then_audio() {
        let spec = JobSpec::new(Some("v.mp4"), Some("a.m4a"), "t", 0);
        let sources: Vec<_> = spec.sources().collect();
        assert_eq!(sources, vec![Path::new("v.mp4"), Path::new("a.m4a")]);

        let audio_only = JobSpec::new(Some(""), Some("a.m4a"), "t", 0);
        let sources: Vec<_> = audio_only.sources().collect();
        assert_eq!(sources, vec![Path::new("a.m4a")]);
    }

    #[test]
    fn test_ensure_title_keeps_existing() {
        let mut spec = JobSpec::new(Some("/in/show.mp4"), None, "Keep Me", 0);
        spec.ensure_title();
        assert_eq!(spec.title, "Keep Me");
    }

    #[test]
    fn test_ensure_title_generates_from_stem() {
        let mut spec = JobSpec::new(None, Some("/in/track01.m4a"), "  ", 0);
        spec.ensure_title();
        assert!(spec.title.starts_with("track01_"), "got {}", spec.title);
        assert_eq!(spec.title.len(), "track01_".len() + 15);
    }

    #[test]
    fn test_missing_sources() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.mp4");
        std::fs::write(&present, b"data").unwrap();
        let empty = dir.path().join("empty.m4a");
        std::fs::write(&empty, b"").unwrap();

        let spec = JobSpec::new(Some(present.clone()), Some(empty.clone()), "t", 0);
        assert_eq!(spec.missing_sources(), vec![empty.as_path()]);

        let spec = JobSpec::new(Some(present), Some(dir.path().join("nope.m4a")), "t", 0);
        assert_eq!(spec.missing_sources().len(), 1);
    }

    #[test]
    fn test_spec_deserializes_duration_alias() {
        let spec: JobSpec =
            serde_json::from_str(r#"{"audio": "a.m4a", "title": "A", "duration": 90}"#).unwrap();
        assert_eq!(spec.expected_duration, 90);
        assert_eq!(spec.video, None);
    }
}
