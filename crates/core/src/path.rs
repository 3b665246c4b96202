//! Property path resolution.
//!
//! A [`PropertyPath`] is a dotted sequence of property names validated at
//! construction time. Resolution reads properties through their accessors
//! only: plain storage fields and write-only properties are reported as
//! not found, never silently skipped.

use std::fmt;

use crate::error::{CoreError, MissingReason, PathNotFound};
use crate::value::Value;

/// Aliases that resolve to the element count of any sized value.
const SIZE_ALIASES: [&str; 2] = ["Length", "Count"];

/// A validated, dot-separated property path such as `"Owner.Name"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    raw: String,
    segments: Vec<String>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Result<PropertyPath, CoreError> {
        if path.is_empty() {
            return Err(CoreError::MalformedPath {
                path: path.to_string(),
                reason: "path is empty".to_string(),
            });
        }
        let mut segments = Vec::new();
        for segment in path.split('.') {
            if !is_identifier(segment) {
                return Err(CoreError::MalformedPath {
                    path: path.to_string(),
                    reason: format!("'{}' is not a valid property name", segment),
                });
            }
            segments.push(segment.to_string());
        }
        Ok(PropertyPath {
            raw: path.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Walk the path from `root`, one property per segment.
    pub fn resolve(&self, root: &Value) -> Result<Value, PathNotFound> {
        let mut current = root.clone();
        for segment in &self.segments {
            current = self.step(&current, segment)?;
        }
        Ok(current)
    }

    fn step(&self, value: &Value, segment: &str) -> Result<Value, PathNotFound> {
        let not_found = |reason| PathNotFound {
            path: self.raw.clone(),
            segment: segment.to_string(),
            on_type: value.type_name().to_string(),
            reason,
        };

        match value {
            Value::Object(obj) => match obj.read_property(segment) {
                Ok(v) => Ok(v.clone()),
                Err(reason) => Err(not_found(reason)),
            },
            Value::Map(entries) => match entries.get(segment) {
                Some(v) => Ok(v.clone()),
                None => size_alias(value, segment).ok_or_else(|| not_found(MissingReason::Missing)),
            },
            Value::List(_) | Value::Text(_) => {
                size_alias(value, segment).ok_or_else(|| not_found(MissingReason::Missing))
            }
            _ => Err(not_found(MissingReason::NotAnObject)),
        }
    }
}

fn size_alias(value: &Value, segment: &str) -> Option<Value> {
    if !SIZE_ALIASES.contains(&segment) {
        return None;
    }
    value.len().map(|n| Value::Int(n as i64))
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
