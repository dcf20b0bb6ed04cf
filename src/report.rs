//! Reporting of recovered per-entry failures
//!
//! The walker never stops on a failed entry. It hands each [`EntryFailure`]
//! to a [`Reporter`] as soon as it happens and keeps a copy for the
//! [`BackupOutcome`](crate::types::BackupOutcome). The default reporter logs
//! through `tracing`; any `FnMut(&EntryFailure)` closure is also a reporter.

use crate::error::EntryFailure;
use tracing::error;

/// Receives recovered failures as they happen
pub trait Reporter: Send {
    /// Called once per failed entry operation
    fn report(&mut self, failure: &EntryFailure);
}

/// Logs each failure as one `error!` line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&mut self, failure: &EntryFailure) {
        error!(
            operation = %failure.operation,
            path = %failure.path.display(),
            "error: {}",
            failure
        );
    }
}

/// Keeps every failure for later inspection, logging nothing
#[derive(Debug, Default)]
pub struct CollectingReporter {
    failures: Vec<EntryFailure>,
}

impl CollectingReporter {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures seen so far
    pub fn failures(&self) -> &[EntryFailure] {
        &self.failures
    }

    /// Number of failures seen so far
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// Whether no failure was reported
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Reporter for CollectingReporter {
    fn report(&mut self, failure: &EntryFailure) {
        self.failures.push(EntryFailure::new(
            failure.operation,
            failure.path.clone(),
            std::io::Error::new(failure.source.kind(), failure.source.to_string()),
        ));
    }
}

impl<F> Reporter for F
where
    F: FnMut(&EntryFailure) + Send,
{
    fn report(&mut self, failure: &EntryFailure) {
        self(failure)
    }
}
