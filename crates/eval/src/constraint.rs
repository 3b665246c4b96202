//! The single capability every matcher implements.
//!
//! Built-in matchers and user-defined constraints both implement
//! [`Constraint`]; a user constraint wrapped with [`crate::Matcher::custom`]
//! composes with `and`, `or` and `not` exactly like a built-in leaf.

use std::fmt;

use attest_core::Value;

use crate::result::EvaluationResult;

/// Evaluate against a normalized value and explain the outcome.
///
/// Implementations must be pure: the same input always produces the same
/// result, and evaluation never changes the constraint.
pub trait Constraint: Send + Sync {
    /// What the constraint requires, e.g. `valid task code`.
    fn description(&self) -> String;

    fn apply(&self, actual: &Value) -> EvaluationResult;
}

type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;

/// A constraint built from a plain boolean function.
pub struct Predicate {
    description: String,
    test: Box<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(description: impl Into<String>, test: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate {
            description: description.into(),
            test: Box::new(test),
        }
    }
}

impl Constraint for Predicate {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn apply(&self, actual: &Value) -> EvaluationResult {
        EvaluationResult::from_bool(self.description(), actual.clone(), (self.test)(actual))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Predicate").field(&self.description).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicate_reports_its_description() {
        let even = Predicate::new("even", |v| matches!(v, Value::Int(i) if i % 2 == 0));
        assert!(even.apply(&Value::Int(4)).passed);

        let r = even.apply(&Value::Int(3));
        assert!(!r.passed);
        assert_eq!(r.description, "even");
        assert_eq!(r.explanation.as_deref(), Some("was 3"));
    }
}
