//! The pluggable evaluation capability.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::environment::Environment;
use crate::graph::CellId;

/// Result of evaluating one snippet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Text the snippet produced (printed output)
    pub output: String,
    /// Environment visible after the snippet ran
    ///
    /// This may be a superset of the input environment; the caller merges it
    /// into the shared environment by name.
    pub bindings: Environment,
}

impl Evaluation {
    pub fn new(output: impl Into<String>, bindings: Environment) -> Self {
        Self {
            output: output.into(),
            bindings,
        }
    }
}

/// Failure reported by an evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_failure(.message, .line))]
pub struct EvalFailure {
    pub message: String,
    /// 1-based line within the snippet, when known
    pub line: Option<usize>,
}

impl EvalFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line: Some(line),
        }
    }
}

fn render_failure(message: &str, line: &Option<usize>) -> String {
    match *line {
        Some(line) => format!("line {}: {}", line, message),
        None => message.to_string(),
    }
}

/// Evaluates snippets of one or more languages against an environment.
///
/// Implementations must not mutate anything shared between cells; the
/// orchestrator merges the returned bindings itself.
pub trait Evaluator: Send + Sync {
    /// Language tags this evaluator accepts, lowercased.
    fn languages(&self) -> Vec<String>;

    /// Evaluate `source` with `env` visible.
    fn evaluate(
        &self,
        source: &str,
        language: &str,
        env: &Environment,
    ) -> Result<Evaluation, EvalFailure>;
}

/// A cell failure, located in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("cell '{cell_id}' failed{}: {message}", render_location(.line, .source_line))]
pub struct EvaluationError {
    /// The failing cell
    pub cell_id: CellId,
    /// Language tag of the failing cell
    pub language: String,
    /// Evaluator's description of the failure
    pub message: String,
    /// Document line of the failure, when the evaluator knew it
    pub line: Option<usize>,
    /// Text of the failing line
    pub source_line: Option<String>,
}

fn render_location(line: &Option<usize>, source_line: &Option<String>) -> String {
    match (*line, source_line.as_deref()) {
        (Some(line), Some(text)) => format!(" at line {} (`{}`)", line, text.trim()),
        (Some(line), None) => format!(" at line {}", line),
        _ => String::new(),
    }
}

/// Dispatches evaluation by language tag.
#[derive(Default, Clone)]
pub struct EvaluatorRegistry {
    evaluators: FxHashMap<String, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an evaluator for a single language tag.
    pub fn register(&mut self, language: impl AsRef<str>, evaluator: Arc<dyn Evaluator>) {
        self.evaluators
            .insert(language.as_ref().to_lowercase(), evaluator);
    }

    /// Register an evaluator under every tag it reports.
    pub fn register_all(&mut self, evaluator: Arc<dyn Evaluator>) {
        for language in evaluator.languages() {
            self.register(language, evaluator.clone());
        }
    }

    /// Get the evaluator for a language tag.
    pub fn get(&self, language: &str) -> Option<&Arc<dyn Evaluator>> {
        self.evaluators.get(&language.to_lowercase())
    }
}

impl std::fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorRegistry")
            .field("languages", &self.languages())
            .finish()
    }
}

impl Evaluator for EvaluatorRegistry {
    fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.evaluators.keys().cloned().collect();
        languages.sort();
        languages
    }

    fn evaluate(
        &self,
        source: &str,
        language: &str,
        env: &Environment,
    ) -> Result<Evaluation, EvalFailure> {
        match self.get(language) {
            Some(evaluator) => evaluator.evaluate(source, language, env),
            None => Err(EvalFailure::new(format!(
                "no evaluator registered for language '{}'",
                language
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::Value;

    struct Echo;

    impl Evaluator for Echo {
        fn languages(&self) -> Vec<String> {
            vec!["echo".to_string(), "say".to_string()]
        }

        fn evaluate(
            &self,
            source: &str,
            language: &str,
            env: &Environment,
        ) -> Result<Evaluation, EvalFailure> {
            let mut bindings = env.clone();
            bindings.set("last", Value::from(language));
            Ok(Evaluation::new(source, bindings))
        }
    }

    #[test]
    fn test_registry_dispatches_by_tag() {
        let mut registry = EvaluatorRegistry::new();
        registry.register_all(Arc::new(Echo));
        assert_eq!(registry.languages(), vec!["echo", "say"]);

        let eval = registry
            .evaluate("hello", "SAY", &Environment::new())
            .unwrap();
        assert_eq!(eval.output, "hello");
        assert_eq!(eval.bindings.get("last"), Some(&Value::from("SAY")));
    }

    #[test]
    fn test_unregistered_language_fails() {
        let registry = EvaluatorRegistry::new();
        let err = registry
            .evaluate("x", "cobol", &Environment::new())
            .unwrap_err();
        assert!(err.message.contains("no evaluator registered"));
        assert_eq!(err.line, None);
    }

    #[test]
    fn test_eval_failure_display() {
        assert_eq!(EvalFailure::at_line("boom", 3).to_string(), "line 3: boom");
        assert_eq!(EvalFailure::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_evaluation_error_display() {
        let err = EvaluationError {
            cell_id: CellId::new("compute"),
            language: "calc".to_string(),
            message: "name 'y' is not defined".to_string(),
            line: Some(12),
            source_line: Some("  z = y + 1".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "cell 'compute' failed at line 12 (`z = y + 1`): name 'y' is not defined"
        );
    }
}
