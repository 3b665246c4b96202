//! The outcome of one evaluation.

use std::fmt;

use attest_core::Value;
use serde::Serialize;

// ──────────────────────────────────────────────
// Divergence
// ──────────────────────────────────────────────

/// One step into a nested value: a sequence index or a map/object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Step {
    Index(usize),
    Key(String),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Index(i) => write!(f, "[{}]", i),
            Step::Key(k) => write!(f, ".{}", k),
        }
    }
}

/// The first point where actual and expected stop agreeing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// Path from the root of the actual value; empty for the root itself.
    pub path: Vec<Step>,
    pub reason: String,
}

impl Divergence {
    pub fn at_root(reason: impl Into<String>) -> Self {
        Divergence {
            path: Vec::new(),
            reason: reason.into(),
        }
    }

    /// Prefix the path with an enclosing step.
    pub fn within(mut self, step: Step) -> Self {
        self.path.insert(0, step);
        self
    }

    /// Top-level sequence index, if the divergence lies inside a sequence.
    pub fn index(&self) -> Option<usize> {
        match self.path.first() {
            Some(Step::Index(i)) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            return write!(f, "{}", self.reason);
        }
        write!(f, "at ")?;
        for step in &self.path {
            write!(f, "{}", step)?;
        }
        write!(f, ": {}", self.reason)
    }
}

// ──────────────────────────────────────────────
// EvaluationResult
// ──────────────────────────────────────────────

/// Why an evaluation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The value did not satisfy the matcher.
    Mismatch,
    /// A property path could not be resolved on the actual value.
    Resolution,
    /// Two values could not be compared.
    Comparator,
}

impl FailureKind {
    /// Resolution and comparator failures are errors, not verdicts, and
    /// are never inverted by negation.
    pub fn is_error(self) -> bool {
        !matches!(self, FailureKind::Mismatch)
    }
}

/// Verdict plus explanation for one `(matcher, actual)` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub passed: bool,
    /// What the matcher requires, e.g. `not equal to 4`.
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    pub actual: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    /// Why the matcher failed, when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl EvaluationResult {
    pub fn pass(description: impl Into<String>, actual: Value) -> Self {
        EvaluationResult {
            passed: true,
            description: description.into(),
            expected: None,
            actual,
            divergence: None,
            failure: None,
            explanation: None,
        }
    }

    pub fn fail(
        kind: FailureKind,
        description: impl Into<String>,
        actual: Value,
        explanation: impl Into<String>,
    ) -> Self {
        EvaluationResult {
            passed: false,
            description: description.into(),
            expected: None,
            actual,
            divergence: None,
            failure: Some(kind),
            explanation: Some(explanation.into()),
        }
    }

    pub fn mismatch(
        description: impl Into<String>,
        actual: Value,
        explanation: impl Into<String>,
    ) -> Self {
        Self::fail(FailureKind::Mismatch, description, actual, explanation)
    }

    /// Pass or mismatch depending on `passed`.
    pub fn from_bool(description: impl Into<String>, actual: Value, passed: bool) -> Self {
        if passed {
            Self::pass(description, actual)
        } else {
            let explanation = format!("was {}", actual);
            Self::mismatch(description, actual, explanation)
        }
    }

    pub fn with_expected(mut self, expected: Value) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_divergence(mut self, divergence: Divergence) -> Self {
        if self.explanation.is_none() {
            self.explanation = Some(divergence.to_string());
        }
        self.divergence = Some(divergence);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.failure.is_some_and(FailureKind::is_error)
    }

    /// Assertion-style message: what was expected and what was found.
    pub fn message(&self) -> String {
        let mut out = format!("Expected: {}\n  But was: {}", self.description, self.actual);
        if let Some(explanation) = &self.explanation {
            out.push_str(&format!("\n  {}", explanation));
        }
        out
    }

    /// Serialize to a JSON record.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_display_includes_path() {
        let d = Divergence::at_root("expected 3 but was 4")
            .within(Step::Index(2))
            .within(Step::Key("rows".into()));
        assert_eq!(d.to_string(), "at .rows[2]: expected 3 but was 4");
        assert_eq!(d.index(), None);
        assert_eq!(Divergence::at_root("x").within(Step::Index(1)).index(), Some(1));
    }

    #[test]
    fn message_reports_expected_and_actual() {
        let r = EvaluationResult::from_bool("not equal to 4", Value::Int(4), false);
        assert_eq!(r.failure, Some(FailureKind::Mismatch));
        assert_eq!(r.message(), "Expected: not equal to 4\n  But was: 4\n  was 4");
    }

    #[test]
    fn to_json_skips_empty_fields() {
        let json = EvaluationResult::pass("empty", Value::List(vec![])).to_json();
        assert_eq!(json["passed"], true);
        assert!(json.get("failure").is_none());
        assert_eq!(json["actual"]["kind"], "list");
    }
}
