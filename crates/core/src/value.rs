//! The normalized runtime value.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::NormalizeError;
use crate::normalize::IntoValue;
use crate::object::{Identity, Object};

/// A normalized value. Sequences of every source shape end up as `List`,
/// associative containers keyed by text end up as `Map`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Opaque(Identity),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Object),
    /// The error side of a captured `Result`, holding the error value.
    Failure(Box<Value>),
}

impl Value {
    /// Human-readable type name, also used as the type tag for instance checks.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Decimal(_) => "Decimal",
            Value::Text(_) => "Text",
            Value::Opaque(id) => &id.type_name,
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Object(obj) => obj.type_name(),
            Value::Failure(_) => "Failure",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Decimal(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The error value of a captured failure.
    pub fn as_failure(&self) -> Option<&Value> {
        match self {
            Value::Failure(err) => Some(err),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Number of elements for lists and maps, characters for text.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            Value::Text(s) => Some(s.chars().count()),
            _ => None,
        }
    }

    /// Eagerly materialize any finite iterator into a `List`.
    pub fn sequence<I>(items: I) -> Value
    where
        I: IntoIterator,
        I::Item: IntoValue,
    {
        Value::List(items.into_iter().map(IntoValue::into_value).collect())
    }

    /// Materialize at most `limit` elements; a longer source is an error
    /// instead of an unbounded allocation.
    pub fn from_iter_bounded<I>(items: I, limit: usize) -> Result<Value, NormalizeError>
    where
        I: IntoIterator,
        I::Item: IntoValue,
    {
        let mut out = Vec::new();
        for item in items {
            if out.len() == limit {
                return Err(NormalizeError::SequenceTooLong { limit });
            }
            out.push(item.into_value());
        }
        Ok(Value::List(out))
    }

    /// Rebuild a rectangular grid stored row-major in `flat` as nested lists,
    /// one nesting level per dimension in `shape`.
    pub fn from_grid<I>(shape: &[usize], flat: I) -> Result<Value, NormalizeError>
    where
        I: IntoIterator,
        I::Item: IntoValue,
    {
        if shape.is_empty() {
            return Err(NormalizeError::EmptyShape);
        }
        let items: Vec<Value> = flat.into_iter().map(IntoValue::into_value).collect();
        let expected: usize = shape.iter().product();
        if items.len() != expected {
            return Err(NormalizeError::GridShape {
                shape: shape.to_vec(),
                expected,
                actual: items.len(),
            });
        }
        let mut iter = items.into_iter();
        Ok(build_grid(shape, &mut iter))
    }
}

fn build_grid(shape: &[usize], items: &mut std::vec::IntoIter<Value>) -> Value {
    match shape.split_first() {
        Some((&n, [])) => Value::List(items.by_ref().take(n).collect()),
        Some((&n, rest)) => Value::List((0..n).map(|_| build_grid(rest, items)).collect()),
        None => Value::List(Vec::new()),
    }
}

impl<T: IntoValue> FromIterator<T> for Value {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Value::sequence(iter)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Decimal(d) => write!(f, "{}m", d),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Opaque(id) => write!(f, "<{}#{}>", id.type_name, id.id),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Object(obj) => {
                write!(f, "{} {{", obj.type_name())?;
                for (i, (name, v)) in obj.valued_members().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, v)?;
                }
                write!(f, " }}")
            }
            Value::Failure(err) => write!(f, "Err({})", err),
        }
    }
}
