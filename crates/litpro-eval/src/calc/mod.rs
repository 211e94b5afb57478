//! `calc`: a small expression language evaluated in process.
//!
//! ```text
//! let rate = 0.25        # `let` is optional
//! total = sum([120, 80]) * (1 + rate); print("total:", total)
//! ```
//!
//! Values are those of the shared environment, so bindings flow between calc
//! cells and any other evaluator that exchanges JSON-shaped values.

mod ast;
mod interp;
mod parser;

use litpro_core::{Environment, EvalFailure, Evaluation, Evaluator};

use interp::Interpreter;

/// Evaluator for `calc` cells.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalcEvaluator;

impl CalcEvaluator {
    pub fn new() -> Self {
        Self
    }
}

impl Evaluator for CalcEvaluator {
    fn languages(&self) -> Vec<String> {
        vec!["calc".to_string()]
    }

    fn evaluate(
        &self,
        source: &str,
        _language: &str,
        env: &Environment,
    ) -> Result<Evaluation, EvalFailure> {
        // Parse everything first so a syntax error anywhere runs nothing.
        let mut program = Vec::new();
        for (idx, line) in source.lines().enumerate() {
            let stmts = parser::parse_line(line).map_err(|column| {
                EvalFailure::at_line(format!("invalid syntax at column {}", column), idx + 1)
            })?;
            program.extend(stmts.into_iter().map(|stmt| (idx + 1, stmt)));
        }

        let mut interp = Interpreter::new(env.clone());
        for (line, stmt) in &program {
            interp
                .exec(stmt)
                .map_err(|message| EvalFailure::at_line(message, *line))?;
        }

        let (output, bindings) = interp.finish();
        tracing::debug!("calc cell ran {} statements", program.len());
        Ok(Evaluation::new(output, bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use litpro_core::Value;

    fn evaluate(source: &str, env: &Environment) -> Result<Evaluation, EvalFailure> {
        CalcEvaluator::new().evaluate(source, "calc", env)
    }

    #[test]
    fn test_bindings_extend_environment() {
        let mut env = Environment::new();
        env.set("x", 5i64);
        let eval = evaluate("y = x * 2\nprint(y)", &env).unwrap();
        assert_eq!(eval.output, "10\n");
        assert_eq!(eval.bindings.get("x"), Some(&Value::Int(5)));
        assert_eq!(eval.bindings.get("y"), Some(&Value::Int(10)));
    }

    #[test]
    fn test_runtime_error_carries_line() {
        let err = evaluate("a = 1\n\nb = a / 0", &Environment::new()).unwrap_err();
        assert_eq!(err.line, Some(3));
        assert_eq!(err.message, "division by zero");
    }

    #[test]
    fn test_syntax_error_runs_nothing() {
        let err = evaluate("print('first')\nx = = 2", &Environment::new()).unwrap_err();
        assert_eq!(err.line, Some(2));
        assert!(err.message.starts_with("invalid syntax"));
    }

    #[test]
    fn test_input_environment_is_not_mutated() {
        let mut env = Environment::new();
        env.set("x", 1i64);
        let _ = evaluate("x = 2\nfail_here()", &env);
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_huge_repetition_is_a_failure() {
        let err = evaluate("s = 'ab' * 9223372036854775807", &Environment::new()).unwrap_err();
        assert_eq!(err.line, Some(1));
        assert_eq!(err.message, "string repetition too large");
    }
}
