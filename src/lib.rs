#![recursion_limit = "256"]
//! mathspeak - rule-driven translation of math markup into spoken English
//!
//! The pipeline has three stages: a LaTeX-like markup parser producing an
//! expression tree, a normalizer that puts trees into a canonical shape, and
//! a rewrite engine that renders a tree against a data-driven rule table.
//! Rule tables are plain JSON (`words`, `types`, `rules`), so the spoken
//! output is fully configurable without touching code.
//!
//! ```
//! assert_eq!(mathspeak::speak("1+2").unwrap(), "1 plus 2");
//! assert_eq!(mathspeak::speak("x^2").unwrap(), "x squared");
//! assert_eq!(mathspeak::speak("3\\frac{1}{2}").unwrap(), "3 and 1 half");
//! ```
//!
//! For custom tables and options, build an [`Evaluator`] from a spec:
//!
//! ```
//! use serde_json::json;
//! let spec = json!({
//!     "method": "translate",
//!     "rules": { "?:integer": "%1", "? + ?": "%1 and then %2" }
//! });
//! let evaluator = mathspeak::Evaluator::from_spec(&spec).unwrap();
//! assert_eq!(evaluator.evaluate("1+2").unwrap(), "1 and then 2");
//! ```

pub mod core;
pub mod data;
pub mod utils;

pub use crate::core::context::Context;
pub use crate::core::model::parser::parse_expression;
pub use crate::core::model::{Node, Op};
pub use crate::core::normalize::normalize;
pub use crate::core::options::Options;
pub use crate::core::speak::{translate, translate_node, RuleSet};
pub use crate::utils::error::{MathError, MathResult, VerboseOutcome};

use crate::data::mathspeak::DEFAULT_TABLE;
use serde_json::Value;

/// A validated spec (options plus rule table) ready to translate any number
/// of expressions. Spec problems surface here, input problems surface per
/// call.
#[derive(Debug, Clone)]
pub struct Evaluator {
    options: Options,
    rules: RuleSet,
}

impl Evaluator {
    /// Build from a spec object: engine options plus an optional `method`
    /// selector (only `"translate"` is supported).
    pub fn from_spec(spec: &Value) -> MathResult<Evaluator> {
        let mut map = match spec {
            Value::Null => serde_json::Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(MathError::invalid_option_value("spec", &other.to_string()))
            }
        };
        if let Some(method) = map.remove("method") {
            if method.as_str() != Some("translate") {
                return Err(MathError::invalid_option_value(
                    "method",
                    &method.to_string(),
                ));
            }
        }
        let options = Options::from_json(&Value::Object(map))?;
        let mut ctx = Context::new(options.clone());
        let rules = if options.words.is_some() || options.rules.is_some() || options.types.is_some()
        {
            RuleSet::from_options(&mut ctx)?
        } else {
            RuleSet::compile(&DEFAULT_TABLE, &mut ctx)?
        };
        Ok(Evaluator { options, rules })
    }

    /// Parse and translate one expression.
    pub fn evaluate(&self, solution: &str) -> MathResult<String> {
        let mut ctx = Context::new(self.options.clone());
        let node = parse_expression(solution, &mut ctx)?;
        translate(&node, &self.rules, &mut ctx)
    }

    /// [`Evaluator::evaluate`] with errors folded into a structured value
    /// located at the user's input.
    pub fn evaluate_verbose(&self, solution: &str) -> VerboseOutcome {
        match self.evaluate(solution) {
            Ok(text) => VerboseOutcome::success(text),
            Err(err) => VerboseOutcome::failure(&err, "user"),
        }
    }
}

/// One-shot verbose translation; spec errors locate at "spec", input errors
/// at "user".
pub fn evaluate_verbose(spec: &Value, solution: &str) -> VerboseOutcome {
    match Evaluator::from_spec(spec) {
        Ok(evaluator) => evaluator.evaluate_verbose(solution),
        Err(err) => VerboseOutcome::failure(&err, "spec"),
    }
}

/// Translate one expression with the default table and options.
pub fn speak(src: &str) -> MathResult<String> {
    let mut ctx = Context::default();
    let rules = RuleSet::compile(&DEFAULT_TABLE, &mut ctx)?;
    let node = parse_expression(src, &mut ctx)?;
    translate(&node, &rules, &mut ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_speak_default_table() {
        assert_eq!(speak("1+2").unwrap(), "1 plus 2");
        assert_eq!(speak("\\frac{1}{2}").unwrap(), "1 half");
    }

    #[test]
    fn test_evaluator_spec_errors_are_config_errors() {
        let err = Evaluator::from_spec(&json!({"nonsense": true})).unwrap_err();
        assert!(matches!(err, MathError::Config { .. }));
        let err = Evaluator::from_spec(&json!({"method": "solve"})).unwrap_err();
        assert!(matches!(err, MathError::Config { .. }));
    }

    #[test]
    fn test_verbose_locations() {
        let bad_spec = evaluate_verbose(&json!({"decimalPlaces": 99}), "1");
        assert!(!bad_spec.is_success());
        assert_eq!(bad_spec.location.as_deref(), Some("spec"));

        let bad_input = evaluate_verbose(&json!({}), "1)");
        assert!(!bad_input.is_success());
        assert!(bad_input.location.as_deref().unwrap_or("").starts_with("user"));
    }
}
