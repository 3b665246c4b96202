//! Error types for matcher construction and value comparison.

use attest_core::{CoreError, NormalizeError};

/// Invalid matcher parameters. Always raised while building a matcher,
/// never deferred to evaluation time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConstructionError {
    /// Tolerance amounts must be finite and non-negative.
    #[error("invalid tolerance {amount}: must be finite and non-negative")]
    InvalidTolerance { amount: f64 },
    /// A percentage tolerance is meaningless against an expected value of zero.
    #[error("percent tolerance cannot be applied to an expected value of zero ({expected})")]
    PercentOfZero { expected: String },
    /// The modifier does not apply to this kind of matcher.
    #[error("'{modifier}' does not apply to a {kind} matcher")]
    NotApplicable {
        modifier: &'static str,
        kind: &'static str,
    },
    /// The matcher needs a collection but was given a scalar.
    #[error("{matcher} expects a collection, got {got}")]
    NotACollection { matcher: &'static str, got: String },
    /// Range bounds are reversed or cannot be ordered.
    #[error("invalid range [{low}, {high}]: {reason}")]
    InvalidRange {
        low: String,
        high: String,
        reason: String,
    },
    #[error("invalid regular expression '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },
    #[error(transparent)]
    Path(#[from] CoreError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Two values could not be ordered or compared.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompareError {
    #[error("cannot compare {left} with {right}")]
    Incomparable { left: String, right: String },
    /// A user-supplied comparator declined to order the pair.
    #[error("comparator '{comparator}' cannot order {left} and {right}")]
    Declined {
        comparator: String,
        left: String,
        right: String,
    },
}
