// ============================================================================
// muxq-core/src/supervisor.rs
// ============================================================================
//
// PROCESS SUPERVISOR: The Serial Control Loop
//
// The supervisor task owns every piece of batch state: the jobs, the pending
// queue, the running map and the completion reporter. Everything that can
// change that state arrives as a typed message and is applied one message at
// a time, so none of it needs a lock.
//
// Two inboxes feed the loop:
// - ControlMessage: submit/cancel/status requests from `BatchQueue` handles
// - InternalMessage: worker output, worker exit/failure and timer expiry
//
// LIFECYCLE OF A JOB:
//   submit -> pending queue -> dispatch (cap permitting) -> spawn -> running
//   running -> output chunks -> progress / aggregate events
//   running -> exit or failure -> resolve once -> dispatch next -> finalize
//
// TIMEOUT ESCALATION:
//   worker_timeout after spawn: graceful terminate
//   kill_grace after that:      forceful kill
// Either way the job resolves through the normal exit path.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::CoreConfig;
use crate::diagnostics::{DiagnosticCause, DiagnosticLog, DiagnosticRecord, StderrCapture};
use crate::error::{CoreError, CoreResult};
use crate::events::{BatchEvent, BatchId, EventSink, JobOutcome};
use crate::external::command::{WorkerInvocation, build_invocation};
use crate::external::worker::{
    OutputStream, WorkerEvent, WorkerEventSender, WorkerExit, WorkerHandle, WorkerSignal,
    WorkerSpawner,
};
use crate::job::{FailureReason, Job, JobId, JobSpec};
use crate::progress::{self, ProgressReading};
use crate::queue::{CancelOutcome, QueueStatus, SubmitOutcome};
use crate::report::CompletionReporter;

// ============================================================================
// MESSAGES
// ============================================================================

/// Requests from `BatchQueue` handles.
pub(crate) enum ControlMessage {
    Submit {
        jobs: Vec<JobSpec>,
        output_dir: PathBuf,
        reply: oneshot::Sender<CoreResult<SubmitOutcome>>,
    },
    Cancel {
        reply: oneshot::Sender<CancelOutcome>,
    },
    Status {
        reply: oneshot::Sender<QueueStatus>,
    },
}

/// Notifications from workers and timers.
#[derive(Debug)]
pub(crate) enum InternalMessage {
    Worker { job: JobId, event: WorkerEvent },
    TimeoutElapsed { job: JobId },
    KillDeadline { job: JobId },
}

// ============================================================================
// BATCH STATE
// ============================================================================

/// Why a terminate request was sent to a running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    NotRequested,
    TimedOut,
    Cancelled,
}

struct RunningWorker<H> {
    handle: H,
    invocation: WorkerInvocation,
    stderr: StderrCapture,
    timer: JoinHandle<()>,
    termination: Termination,
}

struct ActiveBatch<H> {
    id: BatchId,
    output_dir: PathBuf,
    jobs: HashMap<JobId, Job>,
    pending: VecDeque<JobId>,
    running: HashMap<JobId, RunningWorker<H>>,
    reporter: CompletionReporter,
}

impl<H> ActiveBatch<H> {
    fn aggregate(&self) -> u8 {
        progress::aggregate(self.running.keys().filter_map(|id| self.jobs.get(id)))
    }

    fn is_drained(&self) -> bool {
        self.pending.is_empty() && self.running.is_empty()
    }
}

/// A failed job's reason plus the record appended to the diagnostic log.
type Failure = (FailureReason, DiagnosticRecord);

// ============================================================================
// SUPERVISOR
// ============================================================================

pub(crate) struct ProcessSupervisor<S: WorkerSpawner> {
    config: CoreConfig,
    spawner: S,
    internal_tx: mpsc::UnboundedSender<InternalMessage>,
    events: EventSink,
    diagnostics: DiagnosticLog,
    next_job_id: u64,
    next_batch_id: u64,
    batch: Option<ActiveBatch<S::Handle>>,
}

impl<S: WorkerSpawner> ProcessSupervisor<S> {
    pub(crate) fn new(
        config: CoreConfig,
        spawner: S,
        internal_tx: mpsc::UnboundedSender<InternalMessage>,
        events: EventSink,
    ) -> Self {
        let diagnostics = DiagnosticLog::new(config.diagnostic_log.clone());
        Self {
            config,
            spawner,
            internal_tx,
            events,
            diagnostics,
            next_job_id: 1,
            next_batch_id: 1,
            batch: None,
        }
    }

    /// Runs until every `BatchQueue` handle is gone and no batch is in flight.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<ControlMessage>,
        mut internal: mpsc::UnboundedReceiver<InternalMessage>,
    ) {
        let mut commands_open = true;
        loop {
            tokio::select! {
                biased;
                Some(message) = internal.recv() => self.handle_internal(message),
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All queue handles dropped");
                        commands_open = false;
                    }
                },
            }

            if !commands_open && self.batch.is_none() {
                break;
            }
        }
        debug!("Supervisor stopped");
    }

    // ------------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------------

    fn handle_command(&mut self, command: ControlMessage) {
        match command {
            ControlMessage::Submit {
                jobs,
                output_dir,
                reply,
            } => {
                let outcome = self.submit(jobs, output_dir);
                let accepted = matches!(outcome, Ok(SubmitOutcome::Accepted { .. }));
                if reply.send(outcome).is_err() {
                    debug!("Submitter went away before the reply");
                }
                if accepted {
                    self.dispatch_next();
                    self.maybe_finalize();
                }
            }
            ControlMessage::Cancel { reply } => {
                let outcome = self.cancel();
                let _ = reply.send(outcome);
                self.maybe_finalize();
            }
            ControlMessage::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn submit(&mut self, specs: Vec<JobSpec>, output_dir: PathBuf) -> CoreResult<SubmitOutcome> {
        if self.batch.is_some() {
            info!("Rejecting submission: a batch is already in flight");
            return Ok(SubmitOutcome::Busy);
        }
        if specs.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        for spec in &specs {
            spec.validate()?;
        }

        let batch_id = BatchId(self.next_batch_id);
        self.next_batch_id += 1;

        let mut jobs = HashMap::with_capacity(specs.len());
        let mut pending = VecDeque::with_capacity(specs.len());
        for mut spec in specs {
            spec.ensure_title();
            let id = JobId(self.next_job_id);
            self.next_job_id += 1;
            jobs.insert(id, Job::new(spec));
            pending.push_back(id);
        }
        let ids: Vec<JobId> = pending.iter().copied().collect();
        let total = ids.len();

        info!(
            "Accepted batch {} with {} job(s) into {}",
            batch_id,
            total,
            output_dir.display()
        );
        self.events.emit(BatchEvent::BatchStarted {
            batch: batch_id,
            total,
            output_dir: output_dir.clone(),
        });

        self.batch = Some(ActiveBatch {
            id: batch_id,
            output_dir,
            jobs,
            pending,
            running: HashMap::new(),
            reporter: CompletionReporter::new(total),
        });

        Ok(SubmitOutcome::Accepted {
            batch: batch_id,
            jobs: ids,
        })
    }

    fn cancel(&mut self) -> CancelOutcome {
        let Some(batch) = self.batch.as_mut() else {
            return CancelOutcome::Idle;
        };

        let drained_ids: Vec<JobId> = batch.pending.drain(..).collect();

        let mut terminating = 0;
        let kill_grace = self.config.kill_grace();
        for (id, worker) in batch.running.iter_mut() {
            if worker.termination != Termination::NotRequested {
                continue;
            }
            worker.termination = Termination::Cancelled;
            if let Err(e) = worker.handle.signal(WorkerSignal::Terminate) {
                warn!("Failed to terminate job {}: {}", id, e);
            }
            worker.timer.abort();
            worker.timer = schedule(
                &self.internal_tx,
                kill_grace,
                InternalMessage::KillDeadline { job: *id },
            );
            terminating += 1;
        }

        let drained = drained_ids.len();
        for id in drained_ids {
            let command_line = self.command_line_for(id);
            let record = DiagnosticRecord {
                cause: DiagnosticCause::Error("cancelled before start".to_string()),
                command_line,
                error_output: String::new(),
            };
            self.finish_job(id, Err((FailureReason::Cancelled, record)));
        }

        warn!(
            "Cancelling batch: {} pending job(s) drained, {} running job(s) terminating",
            drained, terminating
        );
        self.events.info(format!(
            "Cancelling batch: {drained} pending job(s) drained, {terminating} running job(s) terminating"
        ));

        CancelOutcome::Cancelling {
            drained,
            terminating,
        }
    }

    fn status(&self) -> QueueStatus {
        match &self.batch {
            None => QueueStatus::default(),
            Some(batch) => QueueStatus {
                in_progress: true,
                total: batch.reporter.total(),
                pending: batch.pending.len(),
                running: batch.running.len(),
                failed: batch.reporter.failed(),
                aggregate: batch.aggregate(),
            },
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Fills free running slots from the head of the pending queue.
    fn dispatch_next(&mut self) {
        loop {
            let Some(batch) = self.batch.as_mut() else {
                return;
            };
            if batch.running.len() >= self.config.max_concurrent {
                return;
            }
            let Some(id) = batch.pending.pop_front() else {
                return;
            };
            self.dispatch(id);
        }
    }

    fn dispatch(&mut self, id: JobId) {
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        let Some(job) = batch.jobs.get_mut(&id) else {
            return;
        };

        let invocation = build_invocation(
            &self.config.worker_path,
            job.spec(),
            &batch.output_dir,
            self.config.output_format,
        );

        if let Err(message) = prepare_output_dir(&batch.output_dir, &self.events) {
            let record = DiagnosticRecord {
                cause: DiagnosticCause::Error(message.clone()),
                command_line: invocation.command_line(),
                error_output: String::new(),
            };
            self.finish_job(id, Err((FailureReason::Configuration(message), record)));
            return;
        }

        if !job.start() {
            debug!("Job {} is no longer pending; not dispatching it", id);
            return;
        }
        let title = job.title().to_string();
        let command_line = invocation.command_line();
        let sender = WorkerEventSender::new(id, self.internal_tx.clone());

        match self.spawner.spawn(id, &invocation, sender) {
            Ok(handle) => {
                info!("Started job {} '{}'", id, title);
                debug!("Command: {}", command_line);

                let timer = schedule(
                    &self.internal_tx,
                    self.config.worker_timeout(),
                    InternalMessage::TimeoutElapsed { job: id },
                );
                batch.running.insert(
                    id,
                    RunningWorker {
                        handle,
                        invocation,
                        stderr: StderrCapture::default(),
                        timer,
                        termination: Termination::NotRequested,
                    },
                );
                let aggregate = batch.aggregate();

                self.events.emit(BatchEvent::JobStarted {
                    job: id,
                    title,
                    command: command_line,
                });
                self.events
                    .emit(BatchEvent::AggregateProgress { percent: aggregate });
            }
            Err(e) => {
                let message = e.to_string();
                let record = DiagnosticRecord {
                    cause: DiagnosticCause::Error(message.clone()),
                    command_line,
                    error_output: String::new(),
                };
                self.finish_job(id, Err((FailureReason::Launch(message), record)));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Worker and timer notifications
    // ------------------------------------------------------------------------

    fn handle_internal(&mut self, message: InternalMessage) {
        match message {
            InternalMessage::Worker { job, event } => match event {
                WorkerEvent::Output { stream, chunk } => self.handle_output(job, stream, &chunk),
                WorkerEvent::Exited(exit) => self.handle_exit(job, Ok(exit)),
                WorkerEvent::Failed(message) => self.handle_exit(job, Err(message)),
            },
            InternalMessage::TimeoutElapsed { job } => self.handle_timeout(job),
            InternalMessage::KillDeadline { job } => self.handle_kill_deadline(job),
        }
    }

    fn handle_output(&mut self, id: JobId, stream: OutputStream, chunk: &str) {
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        let Some(worker) = batch.running.get_mut(&id) else {
            trace!("Ignoring output for job {} which is no longer running", id);
            return;
        };
        if stream == OutputStream::Stderr {
            worker.stderr.push(chunk);
        }

        let Some(job) = batch.jobs.get_mut(&id) else {
            return;
        };
        let reading = progress::parse_progress(chunk, job.spec().expected_duration);
        trace!("Job {} {:?} chunk -> {:?}", id, stream, reading);

        if let ProgressReading::Percent(percent) = reading {
            if job.record_progress(percent) {
                let aggregate = batch.aggregate();
                self.events.emit(BatchEvent::JobProgress { job: id, percent });
                self.events
                    .emit(BatchEvent::AggregateProgress { percent: aggregate });
            }
        }
    }

    fn handle_exit(&mut self, id: JobId, exit: Result<WorkerExit, String>) {
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        let Some(worker) = batch.running.remove(&id) else {
            debug!("Ignoring repeated exit notification for job {}", id);
            return;
        };
        worker.timer.abort();

        let outcome = match resolve_exit(&exit, worker.termination, self.config.worker_timeout_secs) {
            None => Ok(()),
            Some(reason) => {
                let cause = match &exit {
                    Ok(WorkerExit::Code(code)) => DiagnosticCause::ExitCode(*code),
                    Ok(WorkerExit::Abnormal(desc)) => DiagnosticCause::Error(desc.clone()),
                    Err(message) => DiagnosticCause::Error(message.clone()),
                };
                let record = DiagnosticRecord {
                    cause,
                    command_line: worker.invocation.command_line(),
                    error_output: worker.stderr.as_str().to_string(),
                };
                Err((reason, record))
            }
        };

        self.finish_job(id, outcome);
        self.dispatch_next();
        self.maybe_finalize();
    }

    fn handle_timeout(&mut self, id: JobId) {
        let kill_grace = self.config.kill_grace();
        let timeout_secs = self.config.worker_timeout_secs;
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        let Some(worker) = batch.running.get_mut(&id) else {
            return;
        };
        if worker.termination != Termination::NotRequested {
            return;
        }

        warn!(
            "Job {} exceeded {}s; requesting termination",
            id, timeout_secs
        );
        worker.termination = Termination::TimedOut;
        if let Err(e) = worker.handle.signal(WorkerSignal::Terminate) {
            warn!("Failed to terminate job {}: {}", id, e);
        }
        worker.timer = schedule(
            &self.internal_tx,
            kill_grace,
            InternalMessage::KillDeadline { job: id },
        );

        let title = batch
            .jobs
            .get(&id)
            .map(|job| job.title().to_string())
            .unwrap_or_default();
        self.events.info(format!(
            "{title}: no exit after {timeout_secs}s, terminating worker"
        ));
    }

    fn handle_kill_deadline(&mut self, id: JobId) {
        let Some(worker) = self
            .batch
            .as_mut()
            .and_then(|batch| batch.running.get_mut(&id))
        else {
            return;
        };
        warn!("Job {} still alive after terminate request; killing", id);
        if let Err(e) = worker.handle.signal(WorkerSignal::Kill) {
            error!("Failed to kill job {}: {}", id, e);
        }
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Applies a job's terminal transition and its side effects, once.
    fn finish_job(&mut self, id: JobId, outcome: Result<(), Failure>) {
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        let Some(job) = batch.jobs.get_mut(&id) else {
            return;
        };
        let title = job.title().to_string();

        let outcome = match outcome {
            Ok(()) => {
                if !job.succeed() {
                    return;
                }
                info!("Job {} '{}' succeeded", id, title);
                JobOutcome::Succeeded
            }
            Err((reason, record)) => {
                if !job.fail(reason.clone()) {
                    return;
                }
                batch.reporter.record_failure();
                error!("Job {} '{}' failed ({}): {}", id, title, reason.category(), reason);
                self.diagnostics.append(&record);
                self.events.error(format!("{title}: {reason}"));
                JobOutcome::Failed { reason }
            }
        };

        let aggregate = batch.aggregate();
        self.events.emit(BatchEvent::JobFinished {
            job: id,
            title,
            outcome,
        });
        self.events
            .emit(BatchEvent::AggregateProgress { percent: aggregate });
    }

    /// Ends the batch once nothing is pending or running.
    fn maybe_finalize(&mut self) {
        if !self.batch.as_ref().is_some_and(ActiveBatch::is_drained) {
            return;
        }
        let Some(mut batch) = self.batch.take() else {
            return;
        };
        if let Some(summary) = batch.reporter.finalize() {
            info!("Batch {} finished: {}", batch.id, summary);
            self.events.emit(BatchEvent::BatchFinished {
                batch: batch.id,
                summary,
            });
        }
    }

    fn command_line_for(&self, id: JobId) -> String {
        self.batch
            .as_ref()
            .and_then(|batch| {
                batch.jobs.get(&id).map(|job| {
                    build_invocation(
                        &self.config.worker_path,
                        job.spec(),
                        &batch.output_dir,
                        self.config.output_format,
                    )
                    .command_line()
                })
            })
            .unwrap_or_default()
    }
}

/// Maps how a worker ended to the job's failure reason, `None` on success.
///
/// A worker that was asked to stop because of the timeout counts as timed
/// out whatever its exit code; a cancelled worker that still exited 0 counts
/// as a success.
fn resolve_exit(
    exit: &Result<WorkerExit, String>,
    termination: Termination,
    timeout_secs: u64,
) -> Option<FailureReason> {
    match (exit, termination) {
        (_, Termination::TimedOut) => Some(FailureReason::TimedOut {
            after_secs: timeout_secs,
        }),
        (Ok(exit), _) if exit.success() => None,
        (_, Termination::Cancelled) => Some(FailureReason::Cancelled),
        (Ok(WorkerExit::Code(code)), Termination::NotRequested) => {
            Some(FailureReason::NonZeroExit(*code))
        }
        (Ok(WorkerExit::Abnormal(desc)), Termination::NotRequested) => {
            Some(FailureReason::AbnormalTermination(desc.clone()))
        }
        (Err(message), Termination::NotRequested) => Some(FailureReason::Launch(message.clone())),
    }
}

/// Checks the output directory before a spawn, creating it when missing.
fn prepare_output_dir(dir: &Path, events: &EventSink) -> Result<(), String> {
    if dir.as_os_str().is_empty() {
        return Err(CoreError::OutputDirNotSet.to_string());
    }
    if dir.is_dir() {
        return Ok(());
    }
    match std::fs::create_dir_all(dir) {
        Ok(()) => {
            info!("Created output directory {}", dir.display());
            events.info(format!("Created output directory {}", dir.display()));
            Ok(())
        }
        Err(source) => Err(CoreError::OutputDirCreate {
            path: dir.to_path_buf(),
            source,
        }
        .to_string()),
    }
}

fn schedule(
    tx: &mpsc::UnboundedSender<InternalMessage>,
    after: Duration,
    message: InternalMessage,
) -> JoinHandle<()> {
    let tx = tx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let _ = tx.send(message);
    })
}
