//! Progress reporting and cooperative cancellation for a run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::evaluator::EvaluationError;
use crate::graph::CellId;

/// Handle for cooperative cancellation of a run.
///
/// Clones share one flag. The orchestrator checks it before starting each
/// cell; a cell that is already evaluating runs to completion.
///
/// # Example
///
/// ```
/// use litpro_core::execute::AbortHandle;
///
/// let handle = AbortHandle::new();
/// let from_signal = handle.clone();
///
/// from_signal.abort();
/// assert!(handle.is_aborted());
/// ```
#[derive(Clone, Default, Debug)]
pub struct AbortHandle {
    aborted: Arc<AtomicBool>,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Relaxed)
    }

    /// Request that no further cells start.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }

    /// Clear a previous request so the handle can be reused for another run.
    pub fn reset(&self) {
        self.aborted.store(false, Ordering::Relaxed);
    }
}

/// Callback trait for execution progress reporting.
pub trait ExecutionCallback: Send + Sync {
    /// Called when a cell starts evaluating.
    fn on_cell_started(&self, cell_id: &CellId, language: &str);

    /// Called when a cell completes successfully.
    fn on_cell_completed(&self, cell_id: &CellId, elapsed: Duration);

    /// Called when a cell fails.
    fn on_cell_error(&self, cell_id: &CellId, error: &EvaluationError);

    /// Called for every cell that will not run because of an earlier failure or abort.
    fn on_cell_skipped(&self, _cell_id: &CellId) {}
}
