//! Evaluators for litpro cells.
//!
//! - [`CalcEvaluator`] runs `calc` cells in process.
//! - [`PythonEvaluator`] runs `python` cells in a subprocess per cell.
//!
//! [`default_registry`] wires both into an [`EvaluatorRegistry`] keyed by
//! language tag.

pub mod calc;
pub mod python;

use std::sync::Arc;

use litpro_core::EvaluatorRegistry;

pub use calc::CalcEvaluator;
pub use python::{PYTHON_ENV_VAR, PythonConfig, PythonEvaluator};

/// Configuration for the built-in evaluators.
#[derive(Debug, Clone, Default)]
pub struct EvalConfig {
    pub python: PythonConfig,
}

/// Build a registry holding every built-in evaluator.
pub fn default_registry(config: &EvalConfig) -> EvaluatorRegistry {
    let mut registry = EvaluatorRegistry::new();
    registry.register_all(Arc::new(CalcEvaluator::new()));
    registry.register_all(Arc::new(PythonEvaluator::new(config.python.clone())));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use litpro_core::Evaluator;

    #[test]
    fn test_default_registry_languages() {
        let registry = default_registry(&EvalConfig::default());
        assert_eq!(registry.languages(), vec!["calc", "py", "python", "python3"]);
        assert!(registry.get("Calc").is_some());
    }
}
