//! Core engine for batch remuxing through an external ffmpeg worker.
//!
//! This crate dispatches a batch of jobs to the worker binary, tracks each
//! job's progress from the worker's diagnostic output, bounds how many
//! workers run at once, escalates termination on timeout and reports the
//! final success/failure tally.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use muxq_core::{BatchEvent, BatchQueue, CoreConfig, JobSpec};
//!
//! # async fn run() -> muxq_core::CoreResult<()> {
//! let (queue, mut events) = BatchQueue::start(CoreConfig::default())?;
//!
//! let job = JobSpec::new(Some("episode.mp4"), Some("episode.m4a"), "Episode 1", 1320);
//! queue.submit(vec![job], "/tmp/remuxed").await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let BatchEvent::BatchFinished { summary, .. } = event {
//!         println!("{summary}");
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod external;
pub mod job;
pub mod progress;
pub mod queue;
pub mod report;
pub mod utils;

mod supervisor;

// Re-exports for public API
pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{CoreError, CoreResult};
pub use events::{BatchEvent, BatchEvents, BatchId, JobOutcome};
pub use external::{OutputFormat, check_worker, probe_duration};
pub use job::{FailureReason, Job, JobId, JobSpec, JobState, PROGRESS_FAILED};
pub use progress::{ProgressReading, aggregate, parse_progress};
pub use queue::{BatchQueue, CancelOutcome, QueueStatus, SubmitOutcome};
pub use report::{BatchSummary, CompletionReporter};
pub use utils::parse_ffmpeg_time;
