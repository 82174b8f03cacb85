//! Events emitted to collaborators while a batch runs.
//!
//! The supervisor pushes every observable change onto an unbounded channel:
//! per-job progress, the batch-wide aggregate, informational and error
//! messages, and the final tally. Consumers read them from the receiver
//! returned by `BatchQueue::start`.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::job::{FailureReason, JobId};
use crate::report::BatchSummary;

pub mod json_handler;

/// Identity of one accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal outcome of a job as reported to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed { reason: FailureReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    BatchStarted {
        batch: BatchId,
        total: usize,
        output_dir: PathBuf,
    },

    /// A worker process was spawned for the job.
    JobStarted {
        job: JobId,
        title: String,
        command: String,
    },

    JobProgress {
        job: JobId,
        percent: u8,
    },

    /// Mean progress of the jobs currently running.
    AggregateProgress {
        percent: u8,
    },

    JobFinished {
        job: JobId,
        title: String,
        outcome: JobOutcome,
    },

    Info {
        message: String,
    },

    Error {
        message: String,
    },

    BatchFinished {
        batch: BatchId,
        summary: BatchSummary,
    },
}

/// Receiving half handed to collaborators.
pub type BatchEvents = mpsc::UnboundedReceiver<BatchEvent>;

/// Sending half owned by the supervisor.
///
/// Emitting never fails: once the collaborator drops its receiver, events
/// are discarded and the engine carries on.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<BatchEvent>,
}

impl EventSink {
    #[must_use]
    pub fn channel() -> (Self, BatchEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: BatchEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("Event receiver dropped; discarding event");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(BatchEvent::Info {
            message: message.into(),
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(BatchEvent::Error {
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_survives_dropped_receiver() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.info("nobody listening");
    }

    #[test]
    fn test_event_json_shape() {
        let event = BatchEvent::JobFinished {
            job: JobId(3),
            title: "Show".to_string(),
            outcome: JobOutcome::Failed {
                reason: FailureReason::NonZeroExit(1),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "job_finished");
        assert_eq!(value["job"], 3);
        assert_eq!(value["outcome"]["status"], "failed");
        assert_eq!(value["outcome"]["reason"]["kind"], "non_zero_exit");
        assert_eq!(value["outcome"]["reason"]["detail"], 1);
    }
}
