//! Normalization of Rust values into [`Value`].
//!
//! Conversion is deterministic: the same source always normalizes to the
//! same `Value`. Unordered hash-based containers are not supported as
//! sequences for that reason; `HashMap` is accepted because it normalizes
//! into a key-ordered `Map`.
//!
//! Known limitation: normalizing an infinite iterator through the unbounded
//! conversions never returns. Use [`Value::from_iter_bounded`] when the
//! source may be unbounded.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use rust_decimal::Decimal;

use crate::object::{Identity, Object};
use crate::value::Value;

/// Conversion of a source value into the engine's normalized [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for &Value {
    fn into_value(self) -> Value {
        self.clone()
    }
}

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    Value::Int(i64::from(self))
                }
            }
        )*
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! wide_int_into_value {
    ($($t:ty),*) => {
        $(
            impl IntoValue for $t {
                fn into_value(self) -> Value {
                    match i64::try_from(self) {
                        Ok(i) => Value::Int(i),
                        Err(_) => Value::Decimal(Decimal::from(self)),
                    }
                }
            }
        )*
    };
}

wide_int_into_value!(u64, usize);

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(f64::from(self))
    }
}

impl IntoValue for Decimal {
    fn into_value(self) -> Value {
        Value::Decimal(self)
    }
}

impl IntoValue for char {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for Object {
    fn into_value(self) -> Value {
        Value::Object(self)
    }
}

impl IntoValue for &Object {
    fn into_value(self) -> Value {
        Value::Object(self.clone())
    }
}

impl IntoValue for Identity {
    fn into_value(self) -> Value {
        Value::Opaque(self)
    }
}

impl IntoValue for &Identity {
    fn into_value(self) -> Value {
        Value::Opaque(self.clone())
    }
}

/// The unit result of an operation that returns nothing.
impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(v) => v.into_value(),
            None => Value::Null,
        }
    }
}

/// `Ok` normalizes to its value; `Err` to a [`Value::Failure`] wrapping
/// the error, so an operation's outcome can be matched as a whole.
impl<T: IntoValue, E: IntoValue> IntoValue for Result<T, E> {
    fn into_value(self) -> Value {
        match self {
            Ok(v) => v.into_value(),
            Err(e) => Value::Failure(Box::new(e.into_value())),
        }
    }
}

// ──────────────────────────────────────────────
// Sequences
// ──────────────────────────────────────────────

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::sequence(self)
    }
}

impl<T: IntoValue + Clone> IntoValue for &Vec<T> {
    fn into_value(self) -> Value {
        Value::sequence(self.iter().cloned())
    }
}

impl<T: IntoValue + Clone> IntoValue for &[T] {
    fn into_value(self) -> Value {
        Value::sequence(self.iter().cloned())
    }
}

impl<T: IntoValue, const N: usize> IntoValue for [T; N] {
    fn into_value(self) -> Value {
        Value::sequence(self)
    }
}

impl<T: IntoValue + Clone, const N: usize> IntoValue for &[T; N] {
    fn into_value(self) -> Value {
        Value::sequence(self.iter().cloned())
    }
}

impl<T: IntoValue> IntoValue for VecDeque<T> {
    fn into_value(self) -> Value {
        Value::sequence(self)
    }
}

impl<T: IntoValue> IntoValue for BTreeSet<T> {
    fn into_value(self) -> Value {
        Value::sequence(self)
    }
}

// ──────────────────────────────────────────────
// Associative containers
// ──────────────────────────────────────────────

impl<K: AsRef<str>, T: IntoValue> IntoValue for BTreeMap<K, T> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.into_value()))
                .collect(),
        )
    }
}

impl<K: AsRef<str>, T: IntoValue> IntoValue for HashMap<K, T> {
    fn into_value(self) -> Value {
        Value::Map(
            self.into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.into_value()))
                .collect(),
        )
    }
}

// ──────────────────────────────────────────────
// Restartable lazy sequences
// ──────────────────────────────────────────────

/// A lazy sequence that can be started over: every normalization calls the
/// factory again and materializes the fresh iterator completely, so the
/// same source compares identically no matter how often it is used.
pub struct Restartable<F> {
    factory: F,
}

impl<F, I> Restartable<F>
where
    F: Fn() -> I,
    I: IntoIterator,
{
    pub fn new(factory: F) -> Self {
        Restartable { factory }
    }

    /// Start a fresh pass over the sequence.
    pub fn iter(&self) -> I::IntoIter {
        (self.factory)().into_iter()
    }
}

impl<F, I> IntoValue for &Restartable<F>
where
    F: Fn() -> I,
    I: IntoIterator,
    I::Item: IntoValue,
{
    fn into_value(self) -> Value {
        Value::sequence(self.iter())
    }
}

impl<F, I> IntoValue for Restartable<F>
where
    F: Fn() -> I,
    I: IntoIterator,
    I::Item: IntoValue,
{
    fn into_value(self) -> Value {
        (&self).into_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_kinds_normalize_identically() {
        let from_array = [1, 2, 3].into_value();
        let from_vec = vec![1, 2, 3].into_value();
        let from_deque = VecDeque::from(vec![1, 2, 3]).into_value();
        let from_slice = (&[1, 2, 3][..]).into_value();
        let from_iter: Value = (1..=3).collect();
        assert_eq!(from_array, from_vec);
        assert_eq!(from_vec, from_deque);
        assert_eq!(from_deque, from_slice);
        assert_eq!(from_slice, from_iter);
    }

    #[test]
    fn nested_arrays_become_nested_lists() {
        let grid = [[[1, 2], [3, 4]], [[5, 6], [7, 8]]].into_value();
        let jagged = vec![
            vec![vec![1, 2], vec![3, 4]],
            vec![vec![5, 6], vec![7, 8]],
        ]
        .into_value();
        assert_eq!(grid, jagged);
    }

    #[test]
    fn restartable_normalizes_the_same_twice() {
        let lazy = Restartable::new(|| (1..=10).map(|i| i * 2));
        let first = (&lazy).into_value();
        let second = (&lazy).into_value();
        assert_eq!(first, second);
        assert_eq!(first.len(), Some(10));
    }

    #[test]
    fn option_none_is_null() {
        assert_eq!(None::<i32>.into_value(), Value::Null);
        assert_eq!(Some("x").into_value(), Value::Text("x".into()));
    }

    #[test]
    fn wide_ints_fall_back_to_decimal() {
        assert_eq!(7u64.into_value(), Value::Int(7));
        assert_eq!(
            u64::MAX.into_value(),
            Value::Decimal(Decimal::from(u64::MAX))
        );
    }

    #[test]
    fn hash_maps_normalize_in_key_order() {
        let mut m = HashMap::new();
        m.insert("b", 2);
        m.insert("a", 1);
        let mut expected = BTreeMap::new();
        expected.insert("a".to_string(), Value::Int(1));
        expected.insert("b".to_string(), Value::Int(2));
        assert_eq!(m.into_value(), Value::Map(expected));
    }

    #[test]
    fn results_normalize_to_value_or_failure() {
        let ok: Result<i32, &str> = Ok(3);
        assert_eq!(ok.into_value(), Value::Int(3));

        let err: Result<i32, Object> = Err(Object::new("ArgumentException").property("Message", "bad"));
        let v = err.into_value();
        assert_eq!(v.type_name(), "Failure");
        assert_eq!(v.as_failure().map(Value::type_name), Some("ArgumentException"));
        assert_eq!(v.to_string(), "Err(ArgumentException { Message: \"bad\" })");
    }
}
