//! Recursive structural equality and order-insensitive equivalence.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use attest_core::{Object, Value};

use crate::comparator::Comparator;
use crate::context::EvalContext;
use crate::numeric::{self, Tolerance};
use crate::result::{Divergence, Step};

/// Options shared by equality and equivalence matchers.
#[derive(Debug, Clone, Default)]
pub struct EqualityOptions {
    pub tolerance: Tolerance,
    pub ignore_case: bool,
    /// Replaces scalar and object equality: equal means the comparator
    /// reports `Ordering::Equal`.
    pub comparer: Option<Comparator>,
}

impl EqualityOptions {
    /// Suffix for descriptions, e.g. ` within 20%`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if !self.tolerance.is_exact() {
            out.push_str(&format!(" {}", self.tolerance));
        }
        if self.ignore_case {
            out.push_str(" ignoring case");
        }
        if let Some(cmp) = &self.comparer {
            out.push_str(&format!(" using {}", cmp.name()));
        }
        out
    }
}

/// Why two values are not equal.
#[derive(Debug, Clone, PartialEq)]
pub enum Inequality {
    /// The values differ.
    Diverged(Divergence),
    /// A custom comparator could not compare a pair.
    Comparator(Divergence),
}

impl Inequality {
    pub fn divergence(&self) -> &Divergence {
        match self {
            Inequality::Diverged(d) | Inequality::Comparator(d) => d,
        }
    }

    fn within(self, step: Step) -> Self {
        match self {
            Inequality::Diverged(d) => Inequality::Diverged(d.within(step)),
            Inequality::Comparator(d) => Inequality::Comparator(d.within(step)),
        }
    }
}

fn diverged(reason: String) -> Result<(), Inequality> {
    Err(Inequality::Diverged(Divergence::at_root(reason)))
}

// ──────────────────────────────────────────────
// Equality
// ──────────────────────────────────────────────

/// Positional, recursive equality. Lists must have equal length and equal
/// elements in order; maps and objects must agree key by key.
pub fn structural_eq(
    expected: &Value,
    actual: &Value,
    opts: &EqualityOptions,
    ctx: &EvalContext,
) -> Result<(), Inequality> {
    match (expected, actual) {
        (Value::List(e), Value::List(a)) => {
            for (i, (ei, ai)) in e.iter().zip(a.iter()).enumerate() {
                structural_eq(ei, ai, opts, ctx).map_err(|err| err.within(Step::Index(i)))?;
            }
            if e.len() != a.len() {
                return diverged(length_reason(e, a, ctx));
            }
            Ok(())
        }
        (Value::Map(e), Value::Map(a)) => keyed_eq(e, a, opts, ctx),
        (Value::Failure(e), Value::Failure(a)) => structural_eq(e, a, opts, ctx),
        _ => match &opts.comparer {
            Some(cmp) => compare_with(cmp, expected, actual, ctx),
            None => scalar_eq(expected, actual, opts, ctx),
        },
    }
}

fn length_reason(expected: &[Value], actual: &[Value], ctx: &EvalContext) -> String {
    if actual.len() > expected.len() {
        format!(
            "expected {} items but got {}; extra: {}",
            expected.len(),
            actual.len(),
            ctx.show(&Value::List(actual[expected.len()..].to_vec()))
        )
    } else {
        format!(
            "expected {} items but got {}; missing: {}",
            expected.len(),
            actual.len(),
            ctx.show(&Value::List(expected[actual.len()..].to_vec()))
        )
    }
}

fn keyed_eq<'a, I, J>(
    expected: I,
    actual: J,
    opts: &EqualityOptions,
    ctx: &EvalContext,
) -> Result<(), Inequality>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
    J: IntoIterator<Item = (&'a String, &'a Value)>,
{
    let expected: BTreeMap<&String, &Value> = expected.into_iter().collect();
    let actual: BTreeMap<&String, &Value> = actual.into_iter().collect();
    for (key, ev) in &expected {
        match actual.get(key) {
            Some(av) => structural_eq(ev, av, opts, ctx)
                .map_err(|err| err.within(Step::Key((*key).clone())))?,
            None => return diverged(format!("missing key '{}'", key)),
        }
    }
    if let Some(extra) = actual.keys().find(|k| !expected.contains_key(*k)) {
        return diverged(format!("unexpected key '{}'", extra));
    }
    Ok(())
}

fn compare_with(
    cmp: &Comparator,
    expected: &Value,
    actual: &Value,
    ctx: &EvalContext,
) -> Result<(), Inequality> {
    match cmp.compare(expected, actual) {
        Ok(Ordering::Equal) => Ok(()),
        Ok(_) => diverged(format!(
            "expected {} but was {} ({})",
            ctx.show(expected),
            ctx.show(actual),
            cmp.name()
        )),
        Err(err) => Err(Inequality::Comparator(Divergence::at_root(err.to_string()))),
    }
}

fn scalar_eq(
    expected: &Value,
    actual: &Value,
    opts: &EqualityOptions,
    ctx: &EvalContext,
) -> Result<(), Inequality> {
    if let Some(equal) = numeric::numbers_equal(expected, actual, opts.tolerance) {
        if equal {
            return Ok(());
        }
        let tolerance = if opts.tolerance.is_exact() {
            String::new()
        } else {
            format!(" {}", opts.tolerance)
        };
        return diverged(format!(
            "expected {}{} but was {}",
            ctx.show(expected),
            tolerance,
            ctx.show(actual)
        ));
    }

    match (expected, actual) {
        (Value::Null, Value::Null) => Ok(()),
        (Value::Bool(e), Value::Bool(a)) if e == a => Ok(()),
        (Value::Text(e), Value::Text(a)) => text_eq(e, a, opts.ignore_case, ctx),
        (Value::Opaque(e), Value::Opaque(a)) if e == a => Ok(()),
        (Value::Object(e), Value::Object(a)) => {
            if e.type_name() != a.type_name() {
                return diverged(format!(
                    "expected type {} but was {}",
                    e.type_name(),
                    a.type_name()
                ));
            }
            let members = |o: &Object| -> Vec<(String, Value)> {
                o.valued_members()
                    .map(|(n, v)| (n.to_string(), v.clone()))
                    .collect()
            };
            let (em, am) = (members(e), members(a));
            keyed_eq(
                em.iter().map(|(k, v)| (k, v)),
                am.iter().map(|(k, v)| (k, v)),
                opts,
                ctx,
            )
        }
        _ if expected.type_name() != actual.type_name() => diverged(format!(
            "expected {} {} but was {} {}",
            expected.type_name(),
            ctx.show(expected),
            actual.type_name(),
            ctx.show(actual)
        )),
        _ => diverged(format!(
            "expected {} but was {}",
            ctx.show(expected),
            ctx.show(actual)
        )),
    }
}

fn text_eq(expected: &str, actual: &str, ignore_case: bool, ctx: &EvalContext) -> Result<(), Inequality> {
    let (e, a) = if ignore_case {
        (expected.to_lowercase(), actual.to_lowercase())
    } else {
        (expected.to_string(), actual.to_string())
    };
    if e == a {
        return Ok(());
    }
    let at = e
        .chars()
        .zip(a.chars())
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| e.chars().count().min(a.chars().count()));
    diverged(format!(
        "expected {} but was {}; strings differ at index {}",
        ctx.show(&Value::Text(expected.to_string())),
        ctx.show(&Value::Text(actual.to_string())),
        at
    ))
}

// ──────────────────────────────────────────────
// Equivalence
// ──────────────────────────────────────────────

/// Same multiset of elements, in any order.
///
/// Tolerances and custom comparers make element equality non-transitive,
/// so elements are paired by maximum bipartite matching (augmenting paths)
/// rather than first fit. The first actual element left unpaired is
/// reported, together with every expected element left over.
pub fn equivalent(
    expected: &[Value],
    actual: &[Value],
    opts: &EqualityOptions,
    ctx: &EvalContext,
) -> Result<(), Inequality> {
    if expected.len() != actual.len() {
        return diverged(format!(
            "expected {} items but got {}",
            expected.len(),
            actual.len()
        ));
    }

    let mut compatible = Vec::with_capacity(actual.len());
    for (i, item) in actual.iter().enumerate() {
        let mut row = Vec::with_capacity(expected.len());
        for candidate in expected {
            match structural_eq(candidate, item, opts, ctx) {
                Ok(()) => row.push(true),
                Err(Inequality::Diverged(_)) => row.push(false),
                Err(Inequality::Comparator(d)) => {
                    return Err(Inequality::Comparator(d.within(Step::Index(i))));
                }
            }
        }
        compatible.push(row);
    }

    // owner[j] is the actual element currently paired with expected[j].
    let mut owner: Vec<Option<usize>> = vec![None; expected.len()];
    let mut unpaired = None;
    for i in 0..actual.len() {
        let mut seen = vec![false; expected.len()];
        if !augment(i, &compatible, &mut seen, &mut owner) && unpaired.is_none() {
            unpaired = Some(i);
        }
    }

    match unpaired {
        None => Ok(()),
        Some(i) => {
            let missing: Vec<Value> = expected
                .iter()
                .zip(owner.iter())
                .filter(|(_, o)| o.is_none())
                .map(|(v, _)| v.clone())
                .collect();
            Err(Inequality::Diverged(
                Divergence::at_root(format!(
                    "unexpected item {}; still missing {}",
                    ctx.show(&actual[i]),
                    ctx.show(&Value::List(missing))
                ))
                .within(Step::Index(i)),
            ))
        }
    }
}

/// Try to pair actual element `i`, re-pairing earlier elements if needed.
fn augment(
    i: usize,
    compatible: &[Vec<bool>],
    seen: &mut [bool],
    owner: &mut [Option<usize>],
) -> bool {
    for j in 0..compatible[i].len() {
        if !compatible[i][j] || seen[j] {
            continue;
        }
        seen[j] = true;
        let free = match owner[j] {
            None => true,
            Some(k) => augment(k, compatible, seen, owner),
        };
        if free {
            owner[j] = Some(i);
            return true;
        }
    }
    false
}

/// True if `needle` is structurally equal to some element of `haystack`.
pub fn occurs_in(haystack: &[Value], needle: &Value, ctx: &EvalContext) -> bool {
    let opts = EqualityOptions::default();
    haystack
        .iter()
        .any(|candidate| structural_eq(candidate, needle, &opts, ctx).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::{Identity, IntoValue};

    fn eq(expected: impl IntoValue, actual: impl IntoValue) -> Result<(), Inequality> {
        structural_eq(
            &expected.into_value(),
            &actual.into_value(),
            &EqualityOptions::default(),
            &EvalContext::default(),
        )
    }

    #[test]
    fn nested_lists_report_the_inner_index() {
        let err = eq(vec![vec![1, 2], vec![3, 4]], vec![vec![1, 2], vec![3, 5]]).unwrap_err();
        let d = err.divergence();
        assert_eq!(d.path, vec![Step::Index(1), Step::Index(1)]);
        assert_eq!(d.reason, "expected 4 but was 5");
        assert_eq!(d.index(), Some(1));
    }

    #[test]
    fn length_mismatch_lists_extra_items() {
        let err = eq(vec![1, 2], vec![1, 2, 3]).unwrap_err();
        assert_eq!(
            err.divergence().reason,
            "expected 2 items but got 3; extra: [3]"
        );
        assert!(err.divergence().path.is_empty());
    }

    #[test]
    fn ints_equal_floats_structurally() {
        assert!(eq(vec![1, 2], vec![1.0, 2.0]).is_ok());
    }

    #[test]
    fn text_case_sensitivity() {
        let err = eq("Hello", "HEllo").unwrap_err();
        assert!(err.divergence().reason.ends_with("strings differ at index 1"));
        let opts = EqualityOptions {
            ignore_case: true,
            ..EqualityOptions::default()
        };
        assert!(structural_eq(
            &"Hello".into_value(),
            &"HEllo".into_value(),
            &opts,
            &EvalContext::default()
        )
        .is_ok());
    }

    #[test]
    fn objects_compare_by_type_and_members() {
        let a = Object::new("Point").property("x", 1).property("y", 2);
        let b = Object::new("Point").property("x", 1).property("y", 3);
        let err = eq(a.clone(), b).unwrap_err();
        assert_eq!(err.divergence().path, vec![Step::Key("y".into())]);
        assert!(eq(a.clone(), a.clone()).is_ok());

        let other = Object::new("Vector").property("x", 1).property("y", 2);
        assert!(eq(a, other).is_err());
    }

    #[test]
    fn opaque_values_compare_by_identity() {
        let a = Identity::fresh("Widget");
        let b = Identity::fresh("Widget");
        assert!(eq(a.clone(), a.clone()).is_ok());
        assert!(eq(a, b).is_err());
    }

    #[test]
    fn comparer_replaces_scalar_equality() {
        let weight = Comparator::new("by weight", |a, b| match (a, b) {
            (Value::Object(x), Value::Object(y)) => numeric::natural_order(
                x.read_property("Weight").ok()?,
                y.read_property("Weight").ok()?,
            )
            .ok(),
            _ => None,
        });
        let opts = EqualityOptions {
            comparer: Some(weight),
            ..EqualityOptions::default()
        };
        let a = Object::new("Thing").property("Weight", 120).property("Tag", "a");
        let c = Object::new("Thing").property("Weight", 120).property("Tag", "c");
        let ctx = EvalContext::default();
        assert!(structural_eq(&a.clone().into_value(), &c.into_value(), &opts, &ctx).is_ok());

        let err = structural_eq(&a.into_value(), &Value::Int(1), &opts, &ctx).unwrap_err();
        assert!(matches!(err, Inequality::Comparator(_)));
    }

    #[test]
    fn equivalence_ignores_order_but_counts_duplicates() {
        let ctx = EvalContext::default();
        let opts = EqualityOptions::default();
        let e = Value::sequence([1, 2, 2, 3]);
        let shuffled = Value::sequence([2, 3, 1, 2]);
        let wrong_counts = Value::sequence([1, 2, 3, 3]);
        assert!(equivalent(e.as_list().unwrap(), shuffled.as_list().unwrap(), &opts, &ctx).is_ok());
        let err = equivalent(e.as_list().unwrap(), wrong_counts.as_list().unwrap(), &opts, &ctx)
            .unwrap_err();
        assert_eq!(err.divergence().index(), Some(3));
        assert_eq!(err.divergence().reason, "unexpected item 3; still missing [2]");
    }

    #[test]
    fn occurs_in_uses_structural_equality() {
        let ctx = EvalContext::default();
        let hay = Value::sequence(vec![vec![1, 2], vec![3]]);
        assert!(occurs_in(hay.as_list().unwrap(), &Value::sequence([3]), &ctx));
        assert!(!occurs_in(hay.as_list().unwrap(), &Value::sequence([2]), &ctx));
    }

    #[test]
    fn equivalence_under_tolerance_finds_a_full_pairing() {
        let ctx = EvalContext::default();
        let opts = EqualityOptions {
            tolerance: Tolerance::Absolute(0.1),
            ..EqualityOptions::default()
        };
        // First fit would pair 1.05 with 1.0 and leave 0.95 without a partner.
        let expected = Value::sequence([1.0, 1.1]);
        let actual = Value::sequence([1.05, 0.95]);
        assert!(equivalent(expected.as_list().unwrap(), actual.as_list().unwrap(), &opts, &ctx).is_ok());

        let too_far = Value::sequence([1.05, 0.85]);
        let err = equivalent(expected.as_list().unwrap(), too_far.as_list().unwrap(), &opts, &ctx)
            .unwrap_err();
        assert_eq!(err.divergence().index(), Some(1));
        assert_eq!(err.divergence().reason, "unexpected item 0.85; still missing [1.1]");
    }

    #[test]
    fn equivalence_with_a_non_transitive_comparer() {
        let close = Comparator::new("within 0.1", |a, b| match (a, b) {
            (Value::Float(x), Value::Float(y)) if (x - y).abs() <= 0.1 => Some(Ordering::Equal),
            (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
            _ => None,
        });
        let opts = EqualityOptions {
            comparer: Some(close),
            ..EqualityOptions::default()
        };
        let ctx = EvalContext::default();
        let expected = Value::sequence([1.0, 1.1, 1.2]);
        let actual = Value::sequence([1.15, 1.05, 0.95]);
        assert!(equivalent(expected.as_list().unwrap(), actual.as_list().unwrap(), &opts, &ctx).is_ok());
    }
}
