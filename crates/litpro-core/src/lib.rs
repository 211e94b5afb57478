//! Core engine for litpro literate documents.
//!
//! This crate provides:
//! - Cell extraction from markdown documents
//! - Dependency graph construction and execution ordering
//! - Sequential execution against a pluggable evaluator
//! - Export to a plain source file and to standalone HTML
//!
//! # Example
//!
//! ```
//! use litpro_core::execute::{EvalFailure, Evaluation, Environment, Evaluator};
//!
//! struct Echo;
//!
//! impl Evaluator for Echo {
//!     fn languages(&self) -> Vec<String> {
//!         vec!["text".to_string()]
//!     }
//!
//!     fn evaluate(
//!         &self,
//!         source: &str,
//!         _language: &str,
//!         env: &Environment,
//!     ) -> Result<Evaluation, EvalFailure> {
//!         Ok(Evaluation::new(source, env.clone()))
//!     }
//! }
//!
//! let doc = "<!-- cell:greet -->\n```text\nhello\n```\n";
//! let report = litpro_core::run_source(doc, &Echo).unwrap();
//! assert!(report.is_success());
//! assert_eq!(report.output("greet"), Some("hello"));
//! ```

pub mod error;
pub mod execute;
pub mod export;
pub mod graph;

pub use error::{Error, Result};
pub use execute::{
    AbortHandle, Environment, EvalFailure, Evaluation, EvaluationError, Evaluator,
    EvaluatorRegistry, ExecutionCallback, Orchestrator, RunOutcome, RunReport, Value,
};
pub use export::{ExportOrder, HtmlOptions, HtmlRenderer, SourceExporter};
pub use graph::{Cell, CellId, CellParser, CellStatus, DependencyGraph, Document, ExecutionOrder};

/// Extract, order and run every cell of a document.
///
/// Extraction and ordering errors are returned as `Err` before any cell runs.
/// A cell failure is not an `Err`: the returned report records which cells
/// succeeded and which one failed.
pub fn run_source(text: &str, evaluator: &dyn Evaluator) -> Result<RunReport> {
    let mut document = CellParser::new().parse_str(text)?;
    let order = DependencyGraph::build(&document)?.execution_order()?;
    Orchestrator::new(evaluator).run(&mut document, &order)
}
