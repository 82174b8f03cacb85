// ============================================================================
// muxq-core/src/external/worker.rs
// ============================================================================
//
// WORKER PROCESSES: Spawning, Monitoring and Signalling
//
// This module defines the seam between the supervisor and the processes it
// drives, plus the production implementation on top of `tokio::process`.
//
// KEY COMPONENTS:
// - WorkerSpawner: Trait for starting a worker for one job
// - WorkerHandle: Trait for signalling a started worker
// - WorkerEventSender: How a worker reports output, exit and errors
// - TokioSpawner / TokioWorker: Real processes with a monitor task each
//
// ORDERING:
// Each TokioWorker has one monitor task that owns the child process. Output
// is read by two reader tasks and forwarded chunk by chunk; the exit is only
// reported after both readers reach EOF (or give up, if a grandchild keeps
// the pipes open). Since every report travels through the same FIFO channel,
// a job's output always reaches the supervisor before its exit.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use super::command::WorkerInvocation;
use crate::error::{CoreResult, launch_error};
use crate::job::JobId;
use crate::supervisor::InternalMessage;

/// Size of the read buffer used for each output pipe.
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long to keep reading output after the process has exited. Bounds the
/// wait when a grandchild inherited the pipes and keeps them open.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// WORKER EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a worker process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    /// Normal exit with a status code.
    Code(i32),
    /// Killed by a signal or otherwise ended without a status code.
    Abnormal(String),
}

impl WorkerExit {
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self, WorkerExit::Code(0))
    }

    #[must_use]
    pub fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return WorkerExit::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return WorkerExit::Abnormal(format!("killed by signal {signal}"));
            }
        }

        WorkerExit::Abnormal("terminated without an exit code".to_string())
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Code(code) => write!(f, "exit code {code}"),
            WorkerExit::Abnormal(desc) => f.write_str(desc),
        }
    }
}

/// A report from a worker about its process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Output { stream: OutputStream, chunk: String },
    Exited(WorkerExit),
    /// The worker's state could not be determined (e.g. waiting failed).
    /// Counted as a failure; a later `Exited` for the same job is ignored.
    Failed(String),
}

/// Reports events for one job back to the supervisor.
///
/// Sends never fail: once the supervisor has gone away, events are dropped.
#[derive(Debug, Clone)]
pub struct WorkerEventSender {
    job: JobId,
    tx: mpsc::UnboundedSender<InternalMessage>,
}

impl WorkerEventSender {
    pub(crate) fn new(job: JobId, tx: mpsc::UnboundedSender<InternalMessage>) -> Self {
        Self { job, tx }
    }

    #[must_use]
    pub fn job(&self) -> JobId {
        self.job
    }

    fn send(&self, event: WorkerEvent) {
        let message = InternalMessage::Worker {
            job: self.job,
            event,
        };
        if self.tx.send(message).is_err() {
            trace!("Supervisor gone; dropping worker event for job {}", self.job);
        }
    }

    pub fn output(&self, stream: OutputStream, chunk: impl Into<String>) {
        self.send(WorkerEvent::Output {
            stream,
            chunk: chunk.into(),
        });
    }

    pub fn exited(&self, exit: WorkerExit) {
        self.send(WorkerEvent::Exited(exit));
    }

    pub fn failed(&self, message: impl Into<String>) {
        self.send(WorkerEvent::Failed(message.into()));
    }
}

// ============================================================================
// SPAWNING ABSTRACTION
// ============================================================================

/// Signal the supervisor may send to a running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    /// Graceful terminate request (SIGTERM on Unix).
    Terminate,
    /// Forceful kill.
    Kill,
}

/// Trait representing a started worker that can be signalled.
pub trait WorkerHandle: Send + 'static {
    fn signal(&mut self, signal: WorkerSignal) -> CoreResult<()>;
}

/// Trait representing something that can start a worker for a job.
///
/// `spawn` is called on the supervisor task. An `Err` means the worker never
/// started; the supervisor resolves the job as a launch failure and expects
/// no events from `events`. On `Ok` the spawner must eventually report
/// exactly one `exited` or `failed` for the job.
pub trait WorkerSpawner: Send + 'static {
    type Handle: WorkerHandle;

    fn spawn(
        &self,
        job: JobId,
        invocation: &WorkerInvocation,
        events: WorkerEventSender,
    ) -> CoreResult<Self::Handle>;
}

// ============================================================================
// TOKIO IMPLEMENTATION
// ============================================================================

/// Spawns real worker processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl TokioSpawner {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Handle to a process started by `TokioSpawner`.
#[derive(Debug)]
pub struct TokioWorker {
    pid: Option<u32>,
    signals: mpsc::UnboundedSender<WorkerSignal>,
}

impl WorkerHandle for TokioWorker {
    fn signal(&mut self, signal: WorkerSignal) -> CoreResult<()> {
        // The monitor owns the child; a closed channel means it already exited.
        if self.signals.send(signal).is_err() {
            debug!("Worker {:?} already exited; {:?} not delivered", self.pid, signal);
        }
        Ok(())
    }
}

impl WorkerSpawner for TokioSpawner {
    type Handle = TokioWorker;

    fn spawn(
        &self,
        job: JobId,
        invocation: &WorkerInvocation,
        events: WorkerEventSender,
    ) -> CoreResult<Self::Handle> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command
            .spawn()
            .map_err(|e| launch_error(&invocation.program, e))?;
        let pid = child.id();
        debug!("Spawned worker for job {} with pid {:?}", job, pid);

        let (signals, signal_rx) = mpsc::unbounded_channel();
        tokio::spawn(monitor(child, signal_rx, events));

        Ok(TokioWorker { pid, signals })
    }
}

async fn monitor(
    mut child: Child,
    mut signals: mpsc::UnboundedReceiver<WorkerSignal>,
    events: WorkerEventSender,
) {
    let stdout = child
        .stdout
        .take()
        .map(|out| tokio::spawn(pump(out, OutputStream::Stdout, events.clone())));
    let stderr = child
        .stderr
        .take()
        .map(|err| tokio::spawn(pump(err, OutputStream::Stderr, events.clone())));

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(signal) = signals.recv() => deliver(&mut child, signal),
        }
    };

    // One deadline shared by both readers
    let deadline = tokio::time::Instant::now() + OUTPUT_DRAIN_TIMEOUT;
    for reader in [stdout, stderr].into_iter().flatten() {
        let abort = reader.abort_handle();
        match tokio::time::timeout_at(deadline, reader).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Output reader for job {} ended abnormally: {}", events.job(), e),
            Err(_) => {
                warn!("Output of job {} still open after exit; abandoning it", events.job());
                abort.abort();
            }
        }
    }

    match status {
        Ok(status) => events.exited(WorkerExit::from_status(status)),
        Err(e) => events.failed(format!("failed to wait for worker: {e}")),
    }
}

async fn pump<R>(mut reader: R, stream: OutputStream, events: WorkerEventSender)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => events.output(stream, String::from_utf8_lossy(&buf[..n])),
            Err(e) => {
                debug!("Read error on {:?} of job {}: {}", stream, events.job(), e);
                break;
            }
        }
    }
}

fn deliver(child: &mut Child, signal: WorkerSignal) {
    match signal {
        WorkerSignal::Terminate => terminate(child),
        WorkerSignal::Kill => {
            if let Err(e) = child.start_kill() {
                warn!("Failed to kill worker {:?}: {}", child.id(), e);
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        warn!("Failed to send SIGTERM to worker {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Failed to terminate worker {:?}: {}", child.id(), e);
    }
}
