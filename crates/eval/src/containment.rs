//! Membership, inclusion, emptiness and uniqueness over normalized
//! collections. Element identity is always structural equality.

use attest_core::Value;

use crate::context::EvalContext;
use crate::result::{Divergence, Step};
use crate::structural::{occurs_in, structural_eq, EqualityOptions};

/// `item` occurs somewhere in `items`.
pub fn has_member(items: &[Value], item: &Value, ctx: &EvalContext) -> Result<(), Divergence> {
    if occurs_in(items, item, ctx) {
        Ok(())
    } else {
        Err(Divergence::at_root(format!(
            "{} does not occur in the collection",
            ctx.show(item)
        )))
    }
}

/// Every element of `items` occurs in `superset`. Equal sets qualify.
pub fn subset_of(items: &[Value], superset: &[Value], ctx: &EvalContext) -> Result<(), Divergence> {
    let missing: Vec<(usize, &Value)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| !occurs_in(superset, item, ctx))
        .collect();
    match missing.first() {
        None => Ok(()),
        Some((index, _)) => {
            let extra: Vec<Value> = missing.iter().map(|(_, v)| (*v).clone()).collect();
            Err(Divergence::at_root(format!(
                "items not in the expected superset: {}",
                ctx.show(&Value::List(extra))
            ))
            .within(Step::Index(*index)))
        }
    }
}

/// Every element of `subset` occurs in `items`. Equal sets qualify.
pub fn superset_of(items: &[Value], subset: &[Value], ctx: &EvalContext) -> Result<(), Divergence> {
    let missing: Vec<Value> = subset
        .iter()
        .filter(|item| !occurs_in(items, item, ctx))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Divergence::at_root(format!(
            "missing items: {}",
            ctx.show(&Value::List(missing))
        )))
    }
}

/// No two elements are structurally equal. Reports the later element of
/// the first duplicate pair.
pub fn unique(items: &[Value], ctx: &EvalContext) -> Result<(), Divergence> {
    let opts = EqualityOptions::default();
    for (i, item) in items.iter().enumerate() {
        if let Some(j) = items[..i]
            .iter()
            .position(|earlier| structural_eq(earlier, item, &opts, ctx).is_ok())
        {
            return Err(Divergence::at_root(format!(
                "{} duplicates item {}",
                ctx.show(item),
                j
            ))
            .within(Step::Index(i)));
        }
    }
    Ok(())
}

/// Zero elements, zero entries or zero characters. `None` when the value
/// is not a container.
pub fn is_empty(value: &Value) -> Option<bool> {
    match value {
        Value::List(_) | Value::Map(_) | Value::Text(_) => value.len().map(|n| n == 0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list<const N: usize>(items: [&str; N]) -> Vec<Value> {
        items.iter().map(|s| Value::Text(s.to_string())).collect()
    }

    #[test]
    fn subset_and_superset() {
        let ctx = EvalContext::default();
        let fruits = list(["apple", "banana", "cherry"]);
        let produce = list(["corn", "apple", "potato", "banana", "carrot", "cherry", "onion"]);
        let with_nuts = list(["apple", "cashew", "banana", "walnut", "cherry"]);

        assert!(subset_of(&fruits, &produce, &ctx).is_ok());
        assert!(superset_of(&produce, &fruits, &ctx).is_ok());
        assert!(subset_of(&fruits, &fruits, &ctx).is_ok());

        let err = subset_of(&with_nuts, &produce, &ctx).unwrap_err();
        assert_eq!(err.index(), Some(1));
        assert_eq!(
            err.reason,
            "items not in the expected superset: [\"cashew\", \"walnut\"]"
        );
        let err = superset_of(&produce, &with_nuts, &ctx).unwrap_err();
        assert_eq!(err.reason, "missing items: [\"cashew\", \"walnut\"]");
    }

    #[test]
    fn membership() {
        let ctx = EvalContext::default();
        let fruits = list(["apple", "banana"]);
        assert!(has_member(&fruits, &Value::Text("banana".into()), &ctx).is_ok());
        assert!(has_member(&fruits, &Value::Text("potato".into()), &ctx).is_err());
    }

    #[test]
    fn uniqueness_reports_first_duplicate() {
        let ctx = EvalContext::default();
        assert!(unique(&list(["a", "b", "c"]), &ctx).is_ok());
        let err = unique(&list(["a", "b", "a", "b"]), &ctx).unwrap_err();
        assert_eq!(err.index(), Some(2));
        assert_eq!(err.reason, "\"a\" duplicates item 0");
    }

    #[test]
    fn emptiness_of_containers() {
        assert_eq!(is_empty(&Value::Text(String::new())), Some(true));
        assert_eq!(is_empty(&Value::Map(Default::default())), Some(true));
        assert_eq!(is_empty(&Value::sequence([1])), Some(false));
        assert_eq!(is_empty(&Value::Int(0)), None);
    }
}
