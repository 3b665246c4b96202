//! Attest constraint evaluator -- builds immutable matcher trees and
//! evaluates them against normalized values, producing a verdict with a
//! human-readable explanation.
//!
//! A [`Matcher`] is built once (fallible constructors validate their
//! parameters up front) and may then be evaluated any number of times,
//! from any number of threads. Evaluation never panics: resolution and
//! comparison problems come back as failed [`EvaluationResult`]s with an
//! error [`FailureKind`].
//!
//! ```
//! use attest_eval::{evaluate, Matcher, Tolerance};
//!
//! let close = Matcher::equal_within(4, Tolerance::percent(20.0).unwrap()).unwrap();
//! assert!(evaluate(&close, 4.5).passed);
//! assert!(!evaluate(&close.negate(), 4.5).passed);
//! ```

pub mod comparator;
pub mod config;
pub mod constraint;
pub mod containment;
pub mod context;
pub mod error;
pub mod matcher;
pub mod numeric;
pub mod ordering;
pub mod result;
pub mod structural;
pub mod text;

pub use attest_core::{IntoValue, Object, Restartable, Value};
pub use comparator::Comparator;
pub use config::{ConfigError, EvalConfig};
pub use constraint::{Constraint, Predicate};
pub use context::EvalContext;
pub use error::{CompareError, ConstructionError};
pub use matcher::{CompareOp, Matcher};
pub use numeric::Tolerance;
pub use ordering::{Direction, KeyChain};
pub use result::{Divergence, EvaluationResult, FailureKind, Step};

use tracing::debug;

/// Evaluates matchers under a fixed rendering configuration.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    ctx: EvalContext,
}

impl Evaluator {
    pub fn new(config: EvalConfig) -> Self {
        Evaluator {
            ctx: EvalContext::new(config),
        }
    }

    /// Build from a JSON configuration object, e.g. `{"max_items": 5}`.
    pub fn from_config_json(v: &serde_json::Value) -> Result<Self, ConfigError> {
        Ok(Evaluator::new(EvalConfig::from_json(v)?))
    }

    pub fn config(&self) -> &EvalConfig {
        &self.ctx.config
    }

    /// Normalize `actual` and evaluate `matcher` against it.
    pub fn evaluate(&self, matcher: &Matcher, actual: impl IntoValue) -> EvaluationResult {
        let actual = actual.into_value();
        let result = matcher.eval(&actual, &self.ctx);
        debug!(
            matcher = %result.description,
            actual_type = actual.type_name(),
            passed = result.passed,
            "evaluated"
        );
        result
    }
}

/// Evaluate with the default configuration.
pub fn evaluate(matcher: &Matcher, actual: impl IntoValue) -> EvaluationResult {
    Evaluator::default().evaluate(matcher, actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluate_reports_description_and_verdict() {
        let m = Matcher::equal_to(4).negate();
        let r = evaluate(&m, 4);
        assert!(!r.passed);
        assert_eq!(r.failure, Some(FailureKind::Mismatch));
        assert_eq!(r.message(), "Expected: not equal to 4\n  But was: 4\n  was 4");
    }

    #[test]
    fn configured_evaluator_elides_long_sequences() {
        let evaluator = Evaluator::from_config_json(&json!({ "max_items": 3 })).unwrap();
        assert_eq!(evaluator.config().max_items, 3);
        let m = Matcher::equal_to(vec![1, 2, 3, 4, 5]);
        let r = evaluator.evaluate(&m, vec![1, 2, 3, 4, 6]);
        assert!(!r.passed);
        assert_eq!(r.description, "equal to [1, 2, 3, ... (2 more)]");
        assert_eq!(r.divergence.as_ref().and_then(|d| d.index()), Some(4));
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(Evaluator::from_config_json(&json!({ "max_items": 0 })).is_err());
        assert!(Evaluator::from_config_json(&json!({ "colour": "red" })).is_err());
    }

    #[test]
    fn result_serializes_to_json() {
        let r = evaluate(&Matcher::equal_to(vec![1, 2]), vec![1, 3]);
        let json = r.to_json();
        assert_eq!(json["passed"], false);
        assert_eq!(json["failure"], "mismatch");
        assert_eq!(json["divergence"]["path"], json!([1]));
    }
}
