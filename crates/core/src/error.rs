//! Error types shared by the value model and the property path resolver.

use std::fmt;

use serde::Serialize;

/// Errors raised while building core values (never during evaluation).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A property path string could not be parsed.
    #[error("malformed property path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },
}

/// Errors raised while normalizing a source value into a [`crate::Value`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// The flattened grid does not hold exactly `product(shape)` elements.
    #[error("grid shape {shape:?} needs {expected} elements, got {actual}")]
    GridShape {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    /// A grid must have at least one dimension.
    #[error("grid shape must have at least one dimension")]
    EmptyShape,
    /// A bounded materialization produced more than `limit` elements.
    #[error("sequence has more than {limit} elements")]
    SequenceTooLong { limit: usize },
}

/// Why a property lookup did not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// No member with that name exists.
    Missing,
    /// The member is a plain field, not a property.
    Field,
    /// The property has no readable accessor.
    WriteOnly,
    /// The value has no members at all (scalar, null, opaque identity).
    NotAnObject,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::Missing => write!(f, "no such property"),
            MissingReason::Field => write!(f, "member is a field, not a property"),
            MissingReason::WriteOnly => write!(f, "property is write-only"),
            MissingReason::NotAnObject => write!(f, "value has no properties"),
        }
    }
}

/// A property path could not be resolved against a specific value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("property '{segment}' of path '{path}' not found on {on_type}: {reason}")]
pub struct PathNotFound {
    /// The full path that was being resolved.
    pub path: String,
    /// The segment that failed.
    pub segment: String,
    /// Type name of the value the segment was looked up on.
    pub on_type: String,
    pub reason: MissingReason,
}
