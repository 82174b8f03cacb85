//! Completion accounting for a batch.
//!
//! `CompletionReporter` holds the total fixed at submission and the failure
//! count incremented by the supervisor on each Failed transition. `finalize`
//! is called exactly once per batch, when nothing is pending or running.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Final tally of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed ({} total)",
            self.succeeded, self.failed, self.total
        )
    }
}

#[derive(Debug)]
pub struct CompletionReporter {
    total: usize,
    failed: usize,
    finalized: bool,
}

impl CompletionReporter {
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            failed: 0,
            finalized: false,
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn record_failure(&mut self) {
        debug_assert!(self.failed < self.total, "more failures than jobs");
        self.failed += 1;
    }

    /// Computes the final tally. Returns `None` if already finalized.
    pub fn finalize(&mut self) -> Option<BatchSummary> {
        if self.finalized {
            return None;
        }
        self.finalized = true;
        Some(BatchSummary {
            total: self.total,
            succeeded: self.total.saturating_sub(self.failed),
            failed: self.failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_counts() {
        let mut reporter = CompletionReporter::new(3);
        reporter.record_failure();

        let summary = reporter.finalize().unwrap();
        assert_eq!(summary, BatchSummary { total: 3, succeeded: 2, failed: 1 });
        assert_eq!(summary.succeeded + summary.failed, summary.total);
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn test_finalize_only_once() {
        let mut reporter = CompletionReporter::new(1);
        assert!(reporter.finalize().is_some());
        assert!(reporter.finalize().is_none());
    }

    #[test]
    fn test_summary_display() {
        let summary = BatchSummary { total: 4, succeeded: 4, failed: 0 };
        assert_eq!(summary.to_string(), "4 succeeded, 0 failed (4 total)");
        assert!(summary.all_succeeded());
    }
}
