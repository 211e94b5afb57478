//! Error types for litpro-core.

use thiserror::Error;

use crate::execute::EvaluationError;

/// Result type for litpro-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in litpro-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Two cells in one document share an id.
    #[error("duplicate cell id '{id}' (first defined on line {first_line}, again on line {second_line})")]
    DuplicateCellId {
        id: String,
        first_line: usize,
        second_line: usize,
    },

    /// A cell marker or its code fence is malformed.
    #[error("malformed cell on line {line}: {message}")]
    MalformedCell { line: usize, message: String },

    /// A code fence was opened but never closed.
    #[error("unterminated code fence for cell '{id}' opened on line {line}")]
    UnterminatedFence { id: String, line: usize },

    /// A cell depends on an id that no cell declares.
    #[error("cell '{cell}' depends on '{dependency}', but no cell has that id")]
    UnknownDependency { cell: String, dependency: String },

    /// Cyclic dependency detected in the cell graph.
    #[error("cyclic dependency detected: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<String> },

    /// Cell not found.
    #[error("cell not found: {0}")]
    CellNotFound(String),

    /// An execution order names the same cell more than once.
    #[error("cell '{0}' appears more than once in the execution order")]
    DuplicateOrderEntry(String),

    /// A cell failed during execution.
    #[error("{0}")]
    Evaluation(Box<EvaluationError>),

    /// Writing an export or rendering failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Execution was aborted by user request.
    #[error("execution aborted")]
    Aborted,
}

impl Error {
    /// Whether this error was raised before any cell could run.
    ///
    /// Structural errors come from extraction and graph construction and
    /// leave no side effects behind.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::DuplicateCellId { .. }
                | Error::MalformedCell { .. }
                | Error::UnterminatedFence { .. }
                | Error::UnknownDependency { .. }
                | Error::CyclicDependency { .. }
        )
    }

    /// Render the error together with a recovery hint, if one applies.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::DuplicateCellId { .. } => {
                Some("rename one of the cells; ids must be unique within a document")
            }
            Error::MalformedCell { .. } => Some(
                "markers look like `<!-- cell:id depends:a,b -->` followed by a fenced block with a language tag",
            ),
            Error::UnterminatedFence { .. } => {
                Some("close the code block with a fence at least as long as the opening one")
            }
            Error::UnknownDependency { .. } => {
                Some("check the spelling in `depends:` or add the missing cell")
            }
            Error::CyclicDependency { .. } => {
                Some("remove one of the `depends:` edges so the cells can be ordered")
            }
            _ => None,
        };

        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}

impl From<EvaluationError> for Error {
    fn from(err: EvaluationError) -> Self {
        Error::Evaluation(Box::new(err))
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} → {}", cycle.join(" → "), first),
        None => "empty cycle".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_closes_the_loop() {
        let err = Error::CyclicDependency {
            cycle: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "cyclic dependency detected: a → b → a");
    }

    #[test]
    fn test_structural_classification() {
        let unknown = Error::UnknownDependency {
            cell: "a".to_string(),
            dependency: "ghost".to_string(),
        };
        assert!(unknown.is_structural());
        assert!(!Error::Aborted.is_structural());
        assert!(!Error::Serialization("disk full".to_string()).is_structural());
    }

    #[test]
    fn test_hint_is_appended() {
        let err = Error::UnknownDependency {
            cell: "a".to_string(),
            dependency: "ghost".to_string(),
        };
        let rendered = err.with_hint();
        assert!(rendered.contains("ghost"));
        assert!(rendered.contains("hint:"));
        assert_eq!(Error::Aborted.with_hint(), "execution aborted");
    }
}
