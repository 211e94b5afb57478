//! Execution engine for literate documents.
//!
//! Cells run one at a time in dependency order. A single [`Environment`] is
//! threaded through the run: each cell sees every binding made by the cells
//! before it, and a successful cell's bindings are merged back by name.
//! Evaluation itself is delegated to an [`Evaluator`], so the engine has no
//! knowledge of any particular language.
//!
//! # Module Structure
//!
//! - `context` - Progress callbacks and cooperative cancellation
//! - `environment` - Values and the binding environment
//! - `evaluator` - The evaluator contract and a registry keyed by language tag
//! - `orchestrator` - The sequential runner and its report

mod context;
mod environment;
mod evaluator;
mod orchestrator;

pub use context::{AbortHandle, ExecutionCallback};
pub use environment::{Environment, Value};
pub use evaluator::{EvalFailure, Evaluation, EvaluationError, Evaluator, EvaluatorRegistry};
pub use orchestrator::{CellResult, Orchestrator, RunOutcome, RunReport};
