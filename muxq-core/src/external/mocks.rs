// ============================================================================
// muxq-core/src/external/mocks.rs
// ============================================================================
//
// MOCKING INFRASTRUCTURE: Scripted Worker Spawner for Tests
//
// Compiled for this crate's tests and, through the "test-mocks" feature, for
// downstream crates. `MockSpawner` never starts a process: each spawn plays
// back a `MockBehavior` on a tokio task, so tests can run on a paused clock.
//
// Expectations are matched by substring against the invocation arguments,
// first match wins and is consumed. Unmatched spawns use the default
// behavior (exit 0 immediately unless overridden).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::command::WorkerInvocation;
use super::worker::{
    OutputStream, WorkerEventSender, WorkerExit, WorkerHandle, WorkerSignal, WorkerSpawner,
};
use crate::error::{CoreError, CoreResult};
use crate::job::JobId;

/// Script for one mocked worker.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Chunks written to stderr right after the spawn.
    pub output: Vec<String>,
    /// Exit code and how long after the spawn it is reported. `None` hangs.
    pub exit: Option<(Duration, i32)>,
    /// Exit code reported on a terminate request. `None` ignores it.
    pub on_terminate: Option<i32>,
    /// Error reported through the event channel before the exit.
    pub report_error: Option<String>,
    /// Makes `spawn` itself fail, as if the binary were missing.
    pub launch_failure: bool,
}

impl MockBehavior {
    /// Exits immediately with `code`. Terminate requests exit with 255.
    pub fn exit(code: i32) -> Self {
        Self {
            output: Vec::new(),
            exit: Some((Duration::ZERO, code)),
            on_terminate: Some(255),
            report_error: None,
            launch_failure: false,
        }
    }

    /// Never exits on its own and ignores terminate requests; only a kill
    /// ends it.
    pub fn hang() -> Self {
        Self {
            exit: None,
            on_terminate: None,
            ..Self::exit(0)
        }
    }

    pub fn launch_failure() -> Self {
        Self {
            launch_failure: true,
            ..Self::exit(0)
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        if let Some((_, code)) = self.exit {
            self.exit = Some((delay, code));
        }
        self
    }

    pub fn with_output<I, S>(mut self, chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output = chunks.into_iter().map(Into::into).collect();
        self
    }

    pub fn exit_on_terminate(mut self, code: i32) -> Self {
        self.on_terminate = Some(code);
        self
    }

    pub fn reporting_error(mut self, message: impl Into<String>) -> Self {
        self.report_error = Some(message.into());
        self
    }
}

/// A spawn the mock received.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub job: JobId,
    pub args: Vec<String>,
    pub at: Instant,
}

impl MockCall {
    pub fn input_count(&self) -> usize {
        self.args.iter().filter(|arg| *arg == "-i").count()
    }
}

/// A signal the mock received.
#[derive(Debug, Clone, Copy)]
pub struct MockSignal {
    pub job: JobId,
    pub signal: WorkerSignal,
    pub at: Instant,
}

#[derive(Debug)]
struct MockState {
    expectations: Vec<(String, MockBehavior)>,
    default: MockBehavior,
    calls: Vec<MockCall>,
    signals: Vec<MockSignal>,
}

/// Scripted implementation of `WorkerSpawner`.
#[derive(Debug, Clone)]
pub struct MockSpawner {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpawner {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                expectations: Vec::new(),
                default: MockBehavior::exit(0),
                calls: Vec::new(),
                signals: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Plays `behavior` for the next spawn whose arguments contain `arg_pattern`.
    pub fn expect(&self, arg_pattern: &str, behavior: MockBehavior) {
        self.lock()
            .expectations
            .push((arg_pattern.to_string(), behavior));
    }

    /// Behavior for spawns that match no expectation.
    pub fn set_default(&self, behavior: MockBehavior) {
        self.lock().default = behavior;
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn signals(&self) -> Vec<MockSignal> {
        self.lock().signals.clone()
    }

    pub fn signals_for(&self, job: JobId) -> Vec<MockSignal> {
        self.signals().into_iter().filter(|s| s.job == job).collect()
    }
}

impl WorkerSpawner for MockSpawner {
    type Handle = MockWorker;

    fn spawn(
        &self,
        job: JobId,
        invocation: &WorkerInvocation,
        events: WorkerEventSender,
    ) -> CoreResult<Self::Handle> {
        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let behavior = {
            let mut state = self.lock();
            state.calls.push(MockCall {
                job,
                args: args.clone(),
                at: Instant::now(),
            });
            match state
                .expectations
                .iter()
                .position(|(pattern, _)| args.iter().any(|arg| arg.contains(pattern.as_str())))
            {
                Some(index) => state.expectations.remove(index).1,
                None => state.default.clone(),
            }
        };

        if behavior.launch_failure {
            log::warn!("MockSpawner simulating launch failure for job {}", job);
            return Err(CoreError::WorkerNotFound(invocation.program.clone()));
        }

        let (signals, signal_rx) = mpsc::unbounded_channel();
        tokio::spawn(play(behavior, signal_rx, events));

        Ok(MockWorker {
            job,
            signals,
            state: Arc::clone(&self.state),
        })
    }
}

/// Handle returned by `MockSpawner`.
#[derive(Debug)]
pub struct MockWorker {
    job: JobId,
    signals: mpsc::UnboundedSender<WorkerSignal>,
    state: Arc<Mutex<MockState>>,
}

impl WorkerHandle for MockWorker {
    fn signal(&mut self, signal: WorkerSignal) -> CoreResult<()> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .signals
            .push(MockSignal {
                job: self.job,
                signal,
                at: Instant::now(),
            });
        let _ = self.signals.send(signal);
        Ok(())
    }
}

async fn play(
    behavior: MockBehavior,
    mut signals: mpsc::UnboundedReceiver<WorkerSignal>,
    events: WorkerEventSender,
) {
    for chunk in behavior.output {
        events.output(OutputStream::Stderr, chunk);
    }
    if let Some(message) = behavior.report_error {
        events.failed(message);
    }

    let deadline = behavior.exit.map(|(delay, code)| (Instant::now() + delay, code));
    let exit = loop {
        let signal = match deadline {
            Some((at, code)) => tokio::select! {
                _ = tokio::time::sleep_until(at) => break WorkerExit::Code(code),
                signal = signals.recv() => signal,
            },
            None => signals.recv().await,
        };

        match signal {
            Some(WorkerSignal::Kill) => break WorkerExit::Abnormal("killed by signal 9".to_string()),
            Some(WorkerSignal::Terminate) => {
                if let Some(code) = behavior.on_terminate {
                    break WorkerExit::Code(code);
                }
            }
            // Handle dropped: the supervisor no longer cares.
            None => return,
        }
    };
    events.exited(exit);
}
