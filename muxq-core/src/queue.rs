// ============================================================================
// muxq-core/src/queue.rs
// ============================================================================
//
// BATCH QUEUE: Public Facade of the Engine
//
// `BatchQueue` is a cheap, cloneable handle to the supervisor task. Each
// method sends one request into the supervisor and waits for its reply, so
// callers never touch batch state directly.
//
// Only one batch may be in flight. A submission while another batch runs is
// answered with `SubmitOutcome::Busy` and changes nothing.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::{BatchEvents, BatchId, EventSink};
use crate::external::worker::{TokioSpawner, WorkerSpawner};
use crate::job::{JobId, JobSpec};
use crate::supervisor::{ControlMessage, ProcessSupervisor};

/// Capacity of the request channel into the supervisor.
const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The batch was queued; `jobs` lists the assigned ids in submission order.
    Accepted { batch: BatchId, jobs: Vec<JobId> },
    /// Another batch is in flight; nothing was changed.
    Busy,
}

/// Answer to a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// No batch was in flight.
    Idle,
    /// Pending jobs were failed as cancelled and running workers were asked
    /// to terminate.
    Cancelling { drained: usize, terminating: usize },
}

/// Snapshot of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub in_progress: bool,
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub failed: usize,
    pub aggregate: u8,
}

#[derive(Debug, Clone)]
pub struct BatchQueue {
    commands: mpsc::Sender<ControlMessage>,
}

impl BatchQueue {
    /// Starts the engine with real worker processes.
    ///
    /// Must be called from within a tokio runtime. Returns the handle and the
    /// receiver for every event the engine emits.
    pub fn start(config: CoreConfig) -> CoreResult<(Self, BatchEvents)> {
        Self::with_spawner(config, TokioSpawner::new())
    }

    /// Starts the engine with a custom spawner.
    pub fn with_spawner<S: WorkerSpawner>(
        config: CoreConfig,
        spawner: S,
    ) -> CoreResult<(Self, BatchEvents)> {
        config.validate()?;
        log::debug!(
            "Starting batch queue (max_concurrent={}, timeout={}s, worker={})",
            config.max_concurrent,
            config.worker_timeout_secs,
            config.worker_path.display()
        );

        let (commands, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (sink, events) = EventSink::channel();

        let supervisor = ProcessSupervisor::new(config, spawner, internal_tx, sink);
        tokio::spawn(supervisor.run(command_rx, internal_rx));

        Ok((Self { commands }, events))
    }

    /// Submits a batch of jobs sharing one output directory.
    ///
    /// Fails with `EmptyBatch` or `InvalidJob` without touching any state.
    pub async fn submit(
        &self,
        jobs: Vec<JobSpec>,
        output_dir: impl Into<PathBuf>,
    ) -> CoreResult<SubmitOutcome> {
        let output_dir = output_dir.into();
        self.request(|reply| ControlMessage::Submit {
            jobs,
            output_dir,
            reply,
        })
        .await?
    }

    /// Cancels the in-flight batch, if any.
    pub async fn cancel(&self) -> CoreResult<CancelOutcome> {
        self.request(|reply| ControlMessage::Cancel { reply }).await
    }

    pub async fn status(&self) -> CoreResult<QueueStatus> {
        self.request(|reply| ControlMessage::Status { reply }).await
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> ControlMessage,
    ) -> CoreResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(message(reply))
            .await
            .map_err(|_| CoreError::QueueClosed)?;
        response.await.map_err(|_| CoreError::QueueClosed)
    }
}
