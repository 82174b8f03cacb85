// ============================================================================
// muxq-core/src/diagnostics.rs
// ============================================================================
//
// DIAGNOSTIC LOG: Append-Only Record of Failed Jobs
//
// Every Failed transition appends one record describing what went wrong:
//
//     Exit code: 1                      (or)   Error: <description>
//     Command: ffmpeg -i a.mp4 ...
//     Error output:
//     <captured stderr>
//     <blank line>
//
// The file is opened in append mode for each record and never truncated.
// Write failures are logged and otherwise ignored; they must not change
// the outcome of the job being recorded.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// How much captured stderr is retained per running worker.
pub const STDERR_CAPTURE_LIMIT: usize = 64 * 1024;

/// What the failure record leads with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticCause {
    ExitCode(i32),
    Error(String),
}

/// One failure, ready to be appended.
#[derive(Debug, Clone)]
pub struct DiagnosticRecord {
    pub cause: DiagnosticCause,
    pub command_line: String,
    pub error_output: String,
}

impl DiagnosticRecord {
    /// Renders the record exactly as written to the log.
    #[must_use]
    pub fn render(&self) -> String {
        let head = match &self.cause {
            DiagnosticCause::ExitCode(code) => format!("Exit code: {code}"),
            DiagnosticCause::Error(message) => format!("Error: {message}"),
        };
        format!(
            "{head}\nCommand: {}\nError output:\n{}\n\n",
            self.command_line,
            self.error_output.trim_end_matches('\n')
        )
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record. Returns whether the write succeeded.
    pub fn append(&self, record: &DiagnosticRecord) -> bool {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(record.render().as_bytes()));

        match result {
            Ok(()) => {
                debug!("Appended failure record to {}", self.path.display());
                true
            }
            Err(e) => {
                warn!(
                    "Could not write diagnostic log {}: {}",
                    self.path.display(),
                    e
                );
                false
            }
        }
    }
}

/// Bounded tail of a worker's stderr.
///
/// Keeps at most `STDERR_CAPTURE_LIMIT` bytes, discarding the oldest output
/// first. Truncation lands on a char boundary.
#[derive(Debug, Default)]
pub struct StderrCapture {
    buffer: String,
}

impl StderrCapture {
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        if self.buffer.len() > STDERR_CAPTURE_LIMIT {
            let mut cut = self.buffer.len() - STDERR_CAPTURE_LIMIT;
            while !self.buffer.is_char_boundary(cut) {
                cut += 1;
            }
            self.buffer.drain(..cut);
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}
