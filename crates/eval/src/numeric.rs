//! Scalar and tolerance comparison.
//!
//! Numeric operands are promoted before comparison: `Int`/`Decimal` pairs
//! compare exactly in `rust_decimal::Decimal`, any pair involving a `Float`
//! compares in `f64`. Tolerances apply only to numeric pairs.

use std::cmp::Ordering;
use std::fmt;

use attest_core::Value;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{CompareError, ConstructionError};

// ──────────────────────────────────────────────
// Tolerance
// ──────────────────────────────────────────────

/// How close two numbers must be to count as equal.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(tag = "mode", content = "amount", rename_all = "snake_case")]
pub enum Tolerance {
    #[default]
    Exact,
    /// `|actual - expected| <= delta`
    Absolute(f64),
    /// `|actual - expected| <= percent / 100 * |expected|`
    Percent(f64),
    /// At most this many representable doubles apart.
    Ulps(u64),
}

impl Tolerance {
    pub fn absolute(delta: f64) -> Result<Tolerance, ConstructionError> {
        Tolerance::Absolute(delta).validated()
    }

    pub fn percent(percent: f64) -> Result<Tolerance, ConstructionError> {
        Tolerance::Percent(percent).validated()
    }

    pub fn ulps(steps: u64) -> Tolerance {
        Tolerance::Ulps(steps)
    }

    /// Reject negative, NaN or infinite amounts.
    pub fn validated(self) -> Result<Tolerance, ConstructionError> {
        match self {
            Tolerance::Absolute(amount) | Tolerance::Percent(amount)
                if !amount.is_finite() || amount < 0.0 =>
            {
                Err(ConstructionError::InvalidTolerance { amount })
            }
            other => Ok(other),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Tolerance::Exact)
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tolerance::Exact => write!(f, "exactly"),
            Tolerance::Absolute(d) => write!(f, "within {}", d),
            Tolerance::Percent(p) => write!(f, "within {}%", p),
            Tolerance::Ulps(n) => write!(f, "within {} ulps", n),
        }
    }
}

/// Reject a percent tolerance when any number inside `expected` is zero.
pub fn check_percent_base(expected: &Value, tolerance: Tolerance) -> Result<(), ConstructionError> {
    if !matches!(tolerance, Tolerance::Percent(_)) {
        return Ok(());
    }
    if contains_zero(expected) {
        return Err(ConstructionError::PercentOfZero {
            expected: expected.to_string(),
        });
    }
    Ok(())
}

fn contains_zero(v: &Value) -> bool {
    match v {
        Value::Int(i) => *i == 0,
        Value::Float(x) => *x == 0.0,
        Value::Decimal(d) => d.is_zero(),
        Value::List(items) => items.iter().any(contains_zero),
        Value::Map(entries) => entries.values().any(contains_zero),
        Value::Object(obj) => obj.valued_members().any(|(_, v)| contains_zero(v)),
        _ => false,
    }
}

// ──────────────────────────────────────────────
// Promotion
// ──────────────────────────────────────────────

enum NumPair {
    Exact(Decimal, Decimal),
    Float(f64, f64),
}

fn to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        Value::Decimal(d) => d.to_f64(),
        _ => None,
    }
}

fn promote(left: &Value, right: &Value) -> Option<NumPair> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(NumPair::Exact(Decimal::from(*l), Decimal::from(*r))),
        (Value::Int(l), Value::Decimal(r)) => Some(NumPair::Exact(Decimal::from(*l), *r)),
        (Value::Decimal(l), Value::Int(r)) => Some(NumPair::Exact(*l, Decimal::from(*r))),
        (Value::Decimal(l), Value::Decimal(r)) => Some(NumPair::Exact(*l, *r)),
        _ => Some(NumPair::Float(to_f64(left)?, to_f64(right)?)),
    }
}

// ──────────────────────────────────────────────
// Equality
// ──────────────────────────────────────────────

/// Compare two numbers under a tolerance. Returns `None` when either side
/// is not numeric.
///
/// `NaN` equals `NaN` here, unlike IEEE-754 equality.
pub fn numbers_equal(expected: &Value, actual: &Value, tolerance: Tolerance) -> Option<bool> {
    let pair = promote(expected, actual)?;
    Some(match pair {
        NumPair::Exact(e, a) => match exact_within(e, a, tolerance) {
            Some(result) => result,
            None => floats_within(e.to_f64()?, a.to_f64()?, tolerance),
        },
        NumPair::Float(e, a) => floats_within(e, a, tolerance),
    })
}

/// Decimal comparison; `None` when the tolerance cannot be expressed in
/// `Decimal` (ulps, or amounts out of range) and `f64` must be used instead.
fn exact_within(expected: Decimal, actual: Decimal, tolerance: Tolerance) -> Option<bool> {
    if expected == actual {
        return Some(true);
    }
    let diff = actual.checked_sub(expected)?.abs();
    match tolerance {
        Tolerance::Exact => Some(false),
        Tolerance::Absolute(delta) => Some(diff <= Decimal::try_from(delta).ok()?),
        Tolerance::Percent(percent) => {
            let bound = expected
                .abs()
                .checked_mul(Decimal::try_from(percent).ok()?)?
                .checked_div(Decimal::ONE_HUNDRED)?;
            Some(diff <= bound)
        }
        Tolerance::Ulps(_) => None,
    }
}

fn floats_within(expected: f64, actual: f64, tolerance: Tolerance) -> bool {
    if expected.is_nan() || actual.is_nan() {
        return expected.is_nan() && actual.is_nan();
    }
    if expected == actual {
        return true;
    }
    match tolerance {
        Tolerance::Exact => false,
        Tolerance::Absolute(delta) => (actual - expected).abs() <= delta,
        Tolerance::Percent(percent) => (actual - expected).abs() <= percent / 100.0 * expected.abs(),
        Tolerance::Ulps(steps) => ulp_distance(expected, actual) <= steps,
    }
}

/// Distance between two doubles in representable steps: adjacent values are
/// 1 apart, `+0.0` and `-0.0` are 0 apart. Computed on the bit patterns so it
/// stays correct across zero and exponent boundaries.
///
/// Callers must rule out NaN first; a NaN operand yields an arbitrary distance.
pub fn ulp_distance(a: f64, b: f64) -> u64 {
    let diff = i128::from(ordered_bits(a)) - i128::from(ordered_bits(b));
    u64::try_from(diff.unsigned_abs()).unwrap_or(u64::MAX)
}

/// Map the sign-magnitude bit pattern onto a monotonically ordered integer.
fn ordered_bits(x: f64) -> i64 {
    let bits = x.to_bits() as i64;
    if bits < 0 {
        i64::MIN - bits
    } else {
        bits
    }
}

/// True only for a floating-point NaN.
pub fn is_nan(v: &Value) -> bool {
    matches!(v, Value::Float(x) if x.is_nan())
}

// ──────────────────────────────────────────────
// Natural ordering
// ──────────────────────────────────────────────

/// The ordering a value exposes on its own: numbers (promoted), text,
/// booleans, lists lexicographically, and objects that declare a natural key.
pub fn natural_order(left: &Value, right: &Value) -> Result<Ordering, CompareError> {
    let incomparable = || CompareError::Incomparable {
        left: left.to_string(),
        right: right.to_string(),
    };

    if let Some(pair) = promote(left, right) {
        return match pair {
            NumPair::Exact(l, r) => Ok(l.cmp(&r)),
            NumPair::Float(l, r) => l.partial_cmp(&r).ok_or_else(incomparable),
        };
    }

    match (left, right) {
        (Value::Text(l), Value::Text(r)) => Ok(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Ok(l.cmp(r)),
        (Value::List(l), Value::List(r)) => {
            for (a, b) in l.iter().zip(r.iter()) {
                match natural_order(a, b)? {
                    Ordering::Equal => continue,
                    other => return Ok(other),
                }
            }
            Ok(l.len().cmp(&r.len()))
        }
        (Value::Object(l), Value::Object(r)) => match (l.natural_key(), r.natural_key()) {
            (Some(lk), Some(rk)) => natural_order(lk, rk),
            _ => Err(incomparable()),
        },
        _ => Err(incomparable()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::Object;

    fn next_up(x: f64) -> f64 {
        f64::from_bits(x.to_bits() + 1)
    }

    #[test]
    fn tolerance_constructors_validate() {
        assert!(Tolerance::absolute(0.0).is_ok());
        assert!(matches!(
            Tolerance::absolute(-0.1),
            Err(ConstructionError::InvalidTolerance { .. })
        ));
        assert!(Tolerance::percent(f64::NAN).is_err());
        assert!(Tolerance::percent(f64::INFINITY).is_err());
    }

    #[test]
    fn ints_and_floats_promote() {
        assert_eq!(numbers_equal(&Value::Int(10), &Value::Float(10.0), Tolerance::Exact), Some(true));
        assert_eq!(
            numbers_equal(&Value::Decimal(Decimal::new(10000, 2)), &Value::Int(100), Tolerance::Exact),
            Some(true)
        );
        assert_eq!(numbers_equal(&Value::Int(1), &Value::Text("1".into()), Tolerance::Exact), None);
    }

    #[test]
    fn inexact_float_math_needs_tolerance() {
        let one_tenth = 1.0 / 10.0;
        let product = Value::Float(one_tenth * one_tenth);
        let hundredth = Value::Float(0.01);
        assert_eq!(numbers_equal(&hundredth, &product, Tolerance::Exact), Some(false));
        assert_eq!(numbers_equal(&hundredth, &product, Tolerance::Absolute(0.000001)), Some(true));
        assert_eq!(numbers_equal(&hundredth, &product, Tolerance::Percent(0.1)), Some(true));
        assert_eq!(numbers_equal(&hundredth, &product, Tolerance::Ulps(1)), Some(true));
    }

    #[test]
    fn absolute_delta_is_inclusive() {
        assert_eq!(numbers_equal(&Value::Int(1), &Value::Float(1.18), Tolerance::Absolute(0.2)), Some(true));
        assert_eq!(numbers_equal(&Value::Int(10), &Value::Int(12), Tolerance::Absolute(2.0)), Some(true));
        assert_eq!(numbers_equal(&Value::Int(10), &Value::Int(13), Tolerance::Absolute(2.0)), Some(false));
    }

    #[test]
    fn nan_equals_nan_only() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(numbers_equal(&nan, &nan, Tolerance::Exact), Some(true));
        assert_eq!(numbers_equal(&nan, &Value::Float(1.0), Tolerance::Absolute(1e300)), Some(false));
        assert!(is_nan(&nan));
        assert!(!is_nan(&Value::Int(0)));
    }

    #[test]
    fn ulp_distance_counts_steps() {
        let b = 1.0;
        assert_eq!(ulp_distance(b, b), 0);
        assert_eq!(ulp_distance(b, next_up(b)), 1);
        assert_eq!(ulp_distance(next_up(next_up(b)), b), 2);
    }

    #[test]
    fn ulp_distance_across_zero_and_exponents() {
        assert_eq!(ulp_distance(0.0, -0.0), 0);
        let tiny = f64::from_bits(1);
        assert_eq!(ulp_distance(tiny, -tiny), 2);
        // 2.0 is the first double of a new exponent; its predecessor is one step below.
        let below_two = f64::from_bits(2.0f64.to_bits() - 1);
        assert_eq!(ulp_distance(below_two, 2.0), 1);
    }

    #[test]
    fn natural_order_of_mixed_numbers() {
        assert_eq!(natural_order(&Value::Int(2), &Value::Float(2.5)), Ok(Ordering::Less));
        assert_eq!(
            natural_order(&Value::Decimal(Decimal::new(10001, 2)), &Value::Int(100)),
            Ok(Ordering::Greater)
        );
        assert!(natural_order(&Value::Float(f64::NAN), &Value::Float(1.0)).is_err());
    }

    #[test]
    fn natural_order_of_objects_uses_their_key() {
        let a = Value::Object(Object::new("Thing").ordered_by(120));
        let b = Value::Object(Object::new("Thing").ordered_by(110));
        assert_eq!(natural_order(&a, &b), Ok(Ordering::Greater));

        let plain = Value::Object(Object::new("Thing"));
        assert!(matches!(
            natural_order(&a, &plain),
            Err(CompareError::Incomparable { .. })
        ));
    }

    #[test]
    fn percent_base_rejects_zero_anywhere() {
        let pct = Tolerance::Percent(5.0);
        assert!(check_percent_base(&Value::Int(0), pct).is_err());
        assert!(check_percent_base(&Value::sequence([1.0, 0.0]), pct).is_err());
        assert!(check_percent_base(&Value::Int(0), Tolerance::Absolute(1.0)).is_ok());
        assert!(check_percent_base(&Value::Int(3), pct).is_ok());
    }
}
