//! Sequential execution of a document's cells.
//!
//! Runs cells one at a time in dependency order, threading one shared
//! environment through them and stopping at the first failure.

use std::time::{Duration, Instant};

use rustc_hash::FxHashSet;
use serde::{Serialize, Serializer};

use super::context::{AbortHandle, ExecutionCallback};
use super::environment::Environment;
use super::evaluator::{EvalFailure, EvaluationError, Evaluator};
use crate::error::{Error, Result};
use crate::graph::{Cell, CellId, CellStatus, Document, ExecutionOrder};

/// Outcome of one cell within a run.
#[derive(Debug, Clone, Serialize)]
pub struct CellResult {
    pub id: CellId,
    pub status: CellStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EvaluationError>,
    /// Wall time spent evaluating (zero for skipped cells)
    pub duration_ms: u64,
    /// Declared persisted names that were bound after the cell ran
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persisted: Vec<String>,
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every cell in the order succeeded.
    Succeeded,
    /// A cell failed; every cell after it was skipped.
    Failed { cell: CellId, error: EvaluationError },
    /// The abort handle was set before `next` could start.
    Aborted { next: CellId },
}

/// Summary of a run, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub results: Vec<CellResult>,
    /// Environment after the last successful cell
    pub environment: Environment,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl RunReport {
    /// Whether every cell succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }

    /// Number of cells that succeeded.
    pub fn succeeded_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == CellStatus::Succeeded)
            .count()
    }

    /// The failure that stopped the run, if any.
    pub fn failure(&self) -> Option<&EvaluationError> {
        match &self.outcome {
            RunOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Captured output of a cell.
    pub fn output(&self, id: &str) -> Option<&str> {
        self.results
            .iter()
            .find(|r| r.id.as_str() == id)
            .and_then(|r| r.output.as_deref())
    }

    /// Convert a failed or aborted run into an error.
    pub fn into_result(self) -> Result<Self> {
        match self.outcome {
            RunOutcome::Succeeded => Ok(self),
            RunOutcome::Failed { error, .. } => Err(error.into()),
            RunOutcome::Aborted { .. } => Err(Error::Aborted),
        }
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

/// Runs a document's cells through an evaluator.
pub struct Orchestrator<'e> {
    evaluator: &'e dyn Evaluator,
    /// Execution callback for progress reporting
    callback: Option<Box<dyn ExecutionCallback>>,
    /// Abort handle for cooperative cancellation
    abort_handle: Option<AbortHandle>,
}

impl<'e> Orchestrator<'e> {
    pub fn new(evaluator: &'e dyn Evaluator) -> Self {
        Self {
            evaluator,
            callback: None,
            abort_handle: None,
        }
    }

    /// Set the execution callback for progress reporting.
    pub fn set_callback(&mut self, callback: impl ExecutionCallback + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Set the abort handle for cooperative cancellation.
    pub fn set_abort_handle(&mut self, handle: AbortHandle) {
        self.abort_handle = Some(handle);
    }

    fn is_aborted(&self) -> bool {
        self.abort_handle.as_ref().is_some_and(|h| h.is_aborted())
    }

    /// Run the cells of `document` in `order`.
    ///
    /// Cell statuses, outputs and errors are written back into the document.
    /// A failing cell is reported in the returned report rather than as an
    /// `Err`; errors are reserved for an order that does not match the
    /// document.
    pub fn run(&self, document: &mut Document, order: &ExecutionOrder) -> Result<RunReport> {
        if let Some(missing) = order.iter().find(|id| !document.contains(id.as_str())) {
            return Err(Error::CellNotFound(missing.to_string()));
        }
        let mut seen = FxHashSet::default();
        if let Some(repeated) = order.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(Error::DuplicateOrderEntry(repeated.to_string()));
        }

        for cell in document.cells_mut() {
            cell.reset();
        }

        let started = Instant::now();
        let mut env = Environment::new();
        let mut results = Vec::with_capacity(order.len());
        let mut outcome = RunOutcome::Succeeded;

        tracing::info!("Running {} cells: {}", order.len(), order);

        for (index, id) in order.iter().enumerate() {
            if self.is_aborted() {
                tracing::info!("Run aborted before cell '{}'", id);
                outcome = RunOutcome::Aborted { next: id.clone() };
                self.skip_remaining(document, &order.ids()[index..], &mut results);
                break;
            }

            let Some(cell) = document.get_mut(id.as_str()) else {
                return Err(Error::CellNotFound(id.to_string()));
            };
            cell.status = CellStatus::Running;
            if let Some(ref callback) = self.callback {
                callback.on_cell_started(id, &cell.language);
            }
            tracing::debug!("Evaluating cell '{}' ({})", id, cell.language);

            let cell_started = Instant::now();
            let evaluated = self.evaluator.evaluate(&cell.source, &cell.language, &env);
            let elapsed = cell_started.elapsed();

            match evaluated {
                Ok(evaluation) => {
                    env.merge(evaluation.bindings);
                    let persisted = persisted_names(cell, &env);
                    cell.status = CellStatus::Succeeded;
                    cell.output = Some(evaluation.output.clone());
                    tracing::debug!("Cell '{}' succeeded in {:?}", id, elapsed);

                    if let Some(ref callback) = self.callback {
                        callback.on_cell_completed(id, elapsed);
                    }
                    results.push(CellResult {
                        id: id.clone(),
                        status: CellStatus::Succeeded,
                        output: Some(evaluation.output),
                        error: None,
                        duration_ms: elapsed.as_millis() as u64,
                        persisted,
                    });
                }
                Err(failure) => {
                    let error = locate_failure(cell, failure);
                    cell.status = CellStatus::Failed;
                    cell.error = Some(error.clone());
                    tracing::debug!("Cell '{}' failed in {:?}", id, elapsed);

                    if let Some(ref callback) = self.callback {
                        callback.on_cell_error(id, &error);
                    }
                    results.push(CellResult {
                        id: id.clone(),
                        status: CellStatus::Failed,
                        output: None,
                        error: Some(error.clone()),
                        duration_ms: elapsed.as_millis() as u64,
                        persisted: Vec::new(),
                    });
                    outcome = RunOutcome::Failed {
                        cell: id.clone(),
                        error,
                    };
                    self.skip_remaining(document, &order.ids()[index + 1..], &mut results);
                    break;
                }
            }
        }

        Ok(RunReport {
            outcome,
            results,
            environment: env,
            elapsed: started.elapsed(),
        })
    }

    fn skip_remaining(&self, document: &mut Document, ids: &[CellId], results: &mut Vec<CellResult>) {
        for id in ids {
            if let Some(cell) = document.get_mut(id.as_str()) {
                cell.status = CellStatus::Skipped;
            }
            if let Some(ref callback) = self.callback {
                callback.on_cell_skipped(id);
            }
            results.push(CellResult {
                id: id.clone(),
                status: CellStatus::Skipped,
                output: None,
                error: None,
                duration_ms: 0,
                persisted: Vec::new(),
            });
        }
        if !ids.is_empty() {
            tracing::debug!("Skipped {} cells", ids.len());
        }
    }
}

/// Declared persisted names bound after the cell ran; missing ones are logged.
fn persisted_names(cell: &Cell, env: &Environment) -> Vec<String> {
    let mut persisted = Vec::with_capacity(cell.persist.len());
    for name in &cell.persist {
        if env.contains(name) {
            persisted.push(name.clone());
        } else {
            tracing::warn!(
                "Cell '{}' declares persist '{}' but left no such binding",
                cell.id,
                name
            );
        }
    }
    persisted
}

/// Attach the cell's identity and document location to an evaluator failure.
fn locate_failure(cell: &Cell, failure: EvalFailure) -> EvaluationError {
    let source_line = failure
        .line
        .filter(|&line| line > 0)
        .and_then(|line| cell.source.lines().nth(line - 1))
        .map(str::to_string);
    EvaluationError {
        cell_id: cell.id.clone(),
        language: cell.language.clone(),
        message: failure.message,
        line: failure.line.map(|line| cell.span.document_line(line)),
        source_line,
    }
}
