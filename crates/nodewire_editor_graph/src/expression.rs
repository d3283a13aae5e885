// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation of function-field expressions.
//!
//! Function fields store expression text and apply it to the value they
//! receive from upstream, bound as `x`. Running that text is arbitrary code
//! execution, so the editor ships with [`DisabledEngine`] and hosts opt in by
//! installing [`JsExpressionEngine`] (or their own engine).

use boa_engine::{Context, Source};
use serde_json::Value;

/// Default cap on expression source size
pub const MAX_EXPRESSION_LENGTH: usize = 64 * 1024;

/// Default cap on iterations of any single loop in an expression
pub const MAX_LOOP_ITERATIONS: u64 = 1_000_000;

/// Default cap on call depth in an expression
pub const MAX_RECURSION_DEPTH: usize = 256;

/// Evaluates function-field expressions
pub trait ExpressionEngine {
    /// Evaluate `expression` with `input` bound as `x`
    fn evaluate(&self, expression: &str, input: &Value) -> Result<Value, ExpressionError>;
}

impl<F> ExpressionEngine for F
where
    F: Fn(&str, &Value) -> Result<Value, ExpressionError>,
{
    fn evaluate(&self, expression: &str, input: &Value) -> Result<Value, ExpressionError> {
        self(expression, input)
    }
}

/// Engine that refuses to run anything
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEngine;

impl ExpressionEngine for DisabledEngine {
    fn evaluate(&self, _expression: &str, _input: &Value) -> Result<Value, ExpressionError> {
        Err(ExpressionError::Disabled)
    }
}

/// Unsandboxed JavaScript evaluation on an embedded interpreter.
///
/// Each call runs in a fresh context. The input crosses into the script as a
/// JSON literal and the result comes back through `JSON.stringify`, so only
/// JSON-representable results survive (`undefined` becomes `null`). Loop
/// iterations and call depth are capped so a runaway expression fails instead
/// of hanging the editor.
#[derive(Debug, Clone)]
pub struct JsExpressionEngine {
    max_expression_length: usize,
    max_loop_iterations: u64,
    max_recursion_depth: usize,
}

impl JsExpressionEngine {
    /// Create an engine with the default size cap
    pub fn new() -> Self {
        Self {
            max_expression_length: MAX_EXPRESSION_LENGTH,
            max_loop_iterations: MAX_LOOP_ITERATIONS,
            max_recursion_depth: MAX_RECURSION_DEPTH,
        }
    }

    /// Override the expression size cap
    pub fn with_max_expression_length(mut self, max: usize) -> Self {
        self.max_expression_length = max;
        self
    }

    /// Override the per-loop iteration cap
    pub fn with_max_loop_iterations(mut self, max: u64) -> Self {
        self.max_loop_iterations = max;
        self
    }

    /// Override the call depth cap
    pub fn with_max_recursion_depth(mut self, max: usize) -> Self {
        self.max_recursion_depth = max;
        self
    }
}

impl Default for JsExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEngine for JsExpressionEngine {
    fn evaluate(&self, expression: &str, input: &Value) -> Result<Value, ExpressionError> {
        if expression.trim().is_empty() {
            return Err(ExpressionError::Evaluation("empty expression".to_string()));
        }
        if expression.len() > self.max_expression_length {
            return Err(ExpressionError::Evaluation(format!(
                "expression is {} bytes, limit is {}",
                expression.len(),
                self.max_expression_length
            )));
        }

        let input_json = serde_json::to_string(input)
            .map_err(|e| ExpressionError::Serialization(e.to_string()))?;
        let code = format!(
            "(function (x) {{ return JSON.stringify({{ \"__output\": ({expression}\n) }}); }})({input_json});"
        );

        let mut context = Context::default();
        let limits = context.runtime_limits_mut();
        limits.set_loop_iteration_limit(self.max_loop_iterations);
        limits.set_recursion_limit(self.max_recursion_depth);
        let result = context
            .eval(Source::from_bytes(&code))
            .map_err(|e| ExpressionError::Evaluation(e.to_string()))?;

        let text = result
            .as_string()
            .map(|s| s.to_std_string_escaped())
            .ok_or_else(|| {
                ExpressionError::Evaluation("expression result is not serializable".to_string())
            })?;

        let wrapper: Value = serde_json::from_str(&text)
            .map_err(|e| ExpressionError::Serialization(e.to_string()))?;
        Ok(wrapper.get("__output").cloned().unwrap_or(Value::Null))
    }
}

/// Whether an expression reads the clock and so needs periodic refresh
pub fn is_time_dependent(expression: &str) -> bool {
    expression.contains("Date")
}

/// Error during expression evaluation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// No engine is installed
    #[error("Expression evaluation is disabled")]
    Disabled,

    /// The expression threw or failed to parse
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// Input or output could not cross the JSON boundary
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_concatenation() {
        let engine = JsExpressionEngine::new();
        let output = engine.evaluate("x + \"!\"", &json!("hello")).unwrap();
        assert_eq!(output, json!("hello!"));
    }

    #[test]
    fn test_structured_input() {
        let engine = JsExpressionEngine::new();
        assert_eq!(engine.evaluate("x * 2", &json!(21)).unwrap(), json!(42));
        assert_eq!(
            engine.evaluate("x.items.length", &json!({"items": [1, 2, 3]})).unwrap(),
            json!(3)
        );
        assert_eq!(
            engine.evaluate("x.map(v => v + 1)", &json!([1, 2])).unwrap(),
            json!([2, 3])
        );
    }

    #[test]
    fn test_undefined_becomes_null() {
        let engine = JsExpressionEngine::new();
        assert_eq!(engine.evaluate("undefined", &json!(1)).unwrap(), json!(null));
    }

    #[test]
    fn test_failures_are_reported() {
        let engine = JsExpressionEngine::new();
        assert!(matches!(
            engine.evaluate("x +", &json!(1)),
            Err(ExpressionError::Evaluation(_))
        ));
        assert!(engine.evaluate("missing.value", &json!(null)).is_err());
        assert!(engine.evaluate("   ", &json!(null)).is_err());
    }

    #[test]
    fn test_runaway_expressions_are_stopped() {
        let engine = JsExpressionEngine::new()
            .with_max_loop_iterations(10_000)
            .with_max_recursion_depth(64);
        assert!(matches!(
            engine.evaluate("(() => { while (true) {} })()", &json!(null)),
            Err(ExpressionError::Evaluation(_))
        ));
        assert!(matches!(
            engine.evaluate("(function f(n) { return f(n + 1); })(0)", &json!(null)),
            Err(ExpressionError::Evaluation(_))
        ));
        // Bounded loops under the cap still run
        let bounded = "(() => { let s = 0; for (let i = 0; i < 100; i++) s += i; return s; })()";
        assert_eq!(engine.evaluate(bounded, &json!(null)).unwrap(), json!(4950));

        let tiny = JsExpressionEngine::new().with_max_expression_length(4);
        assert!(tiny.evaluate("x + 12345", &json!(0)).is_err());
    }

    #[test]
    fn test_disabled_engine() {
        assert_eq!(
            DisabledEngine.evaluate("x", &json!(1)),
            Err(ExpressionError::Disabled)
        );
    }

    #[test]
    fn test_time_dependence() {
        assert!(is_time_dependent("new Date().getSeconds()"));
        assert!(is_time_dependent("Date.now() - x"));
        assert!(!is_time_dependent("x + 1"));
    }
}
