//! Graph engine for dependency resolution.
//!
//! This module provides:
//! - Cell extraction from literate markdown documents
//! - Dependency graph construction
//! - Topological ordering for execution
//! - Cycle detection that names the smallest offending cycle

mod engine;
mod parser;
mod types;

pub use engine::{DependencyGraph, ExecutionOrder};
pub use parser::CellParser;
pub use types::{Cell, CellId, CellStatus, Document, MarkerStyle, ProseBlock, SourceSpan};
