//! Matcher trees.
//!
//! A [`Matcher`] is an immutable, persistent tree: children are shared
//! through `Arc`, and every combinator or modifier builds a new node
//! without touching the ones it was built from. A matcher built once can
//! be evaluated any number of times, from any number of threads, and
//! always reflects its full structure (including negations).

use std::cmp::Ordering;
use std::fmt;
use std::ops;
use std::sync::Arc;

use attest_core::{Identity, IntoValue, PropertyPath, Value};
use tracing::trace;

use crate::comparator::Comparator;
use crate::constraint::{Constraint, Predicate};
use crate::containment;
use crate::context::EvalContext;
use crate::error::ConstructionError;
use crate::numeric::{self, Tolerance};
use crate::ordering::{self, KeyChain, OrderingFailure};
use crate::result::{Divergence, EvaluationResult, FailureKind, Step};
use crate::structural::{self, EqualityOptions, Inequality};
use crate::text::{TextMatcher, TextPattern};

/// Relational operator for comparison leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    LessThan,
    AtMost,
    GreaterThan,
    AtLeast,
}

impl CompareOp {
    /// Does `actual <op> bound` hold, given `actual.cmp(bound)`?
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::LessThan => ord == Ordering::Less,
            CompareOp::AtMost => ord != Ordering::Greater,
            CompareOp::GreaterThan => ord == Ordering::Greater,
            CompareOp::AtLeast => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::LessThan => write!(f, "less than"),
            CompareOp::AtMost => write!(f, "less than or equal to"),
            CompareOp::GreaterThan => write!(f, "greater than"),
            CompareOp::AtLeast => write!(f, "greater than or equal to"),
        }
    }
}

enum Node {
    EqualTo {
        expected: Value,
        options: EqualityOptions,
    },
    EquivalentTo {
        expected: Vec<Value>,
        options: EqualityOptions,
    },
    IsNaN,
    Null,
    True,
    False,
    SameAs(Identity),
    InstanceOf(String),
    ExactType(String),
    Compare {
        op: CompareOp,
        bound: Value,
        comparator: Comparator,
    },
    InRange {
        low: Value,
        high: Value,
        comparator: Comparator,
    },
    OrderedBy(KeyChain),
    HasMember(Value),
    MemberOf(Vec<Value>),
    SubsetOf(Vec<Value>),
    SupersetOf(Vec<Value>),
    Empty,
    Unique,
    HasProperty(PropertyPath),
    Property {
        path: PropertyPath,
        child: Matcher,
    },
    Text(TextMatcher),
    AllItems(Matcher),
    SomeItem(Matcher),
    NoItem(Matcher),
    Exactly {
        count: usize,
        child: Matcher,
    },
    Not(Matcher),
    And(Matcher, Matcher),
    Or(Matcher, Matcher),
    Custom(Arc<dyn Constraint>),
    /// The actual is a captured failure whose error satisfies the child, if any.
    Throws(Option<Matcher>),
    ThrowsNothing,
}

impl Node {
    fn kind(&self) -> &'static str {
        match self {
            Node::EqualTo { .. } => "equal-to",
            Node::EquivalentTo { .. } => "equivalent-to",
            Node::IsNaN => "NaN",
            Node::Null => "null",
            Node::True | Node::False => "boolean",
            Node::SameAs(_) => "same-as",
            Node::InstanceOf(_) | Node::ExactType(_) => "type",
            Node::Compare { .. } => "comparison",
            Node::InRange { .. } => "range",
            Node::OrderedBy(_) => "ordered",
            Node::HasMember(_) | Node::MemberOf(_) => "membership",
            Node::SubsetOf(_) | Node::SupersetOf(_) => "inclusion",
            Node::Empty => "empty",
            Node::Unique => "unique",
            Node::HasProperty(_) | Node::Property { .. } => "property",
            Node::Text(_) => "text",
            Node::AllItems(_) | Node::SomeItem(_) | Node::NoItem(_) | Node::Exactly { .. } => {
                "collective"
            }
            Node::Not(_) => "not",
            Node::And(..) => "and",
            Node::Or(..) => "or",
            Node::Custom(_) => "custom",
            Node::Throws(_) | Node::ThrowsNothing => "outcome",
        }
    }
}

/// A matching expression. Cheap to clone; never mutated after construction.
#[derive(Clone)]
pub struct Matcher(Arc<Node>);

fn collection(matcher: &'static str, source: impl IntoValue) -> Result<Vec<Value>, ConstructionError> {
    match source.into_value() {
        Value::List(items) => Ok(items),
        other => Err(ConstructionError::NotACollection {
            matcher,
            got: other.type_name().to_string(),
        }),
    }
}

// ──────────────────────────────────────────────
// Construction
// ──────────────────────────────────────────────

impl Matcher {
    fn node(node: Node) -> Matcher {
        Matcher(Arc::new(node))
    }

    pub fn equal_to(expected: impl IntoValue) -> Matcher {
        Matcher::node(Node::EqualTo {
            expected: expected.into_value(),
            options: EqualityOptions::default(),
        })
    }

    /// Equality with a rectangular grid stored row-major in `flat`.
    pub fn equal_to_grid(
        shape: &[usize],
        flat: impl IntoIterator<Item = impl IntoValue>,
    ) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::equal_to(Value::from_grid(shape, flat)?))
    }

    /// Equality under a numeric tolerance.
    pub fn equal_within(
        expected: impl IntoValue,
        tolerance: Tolerance,
    ) -> Result<Matcher, ConstructionError> {
        Matcher::equal_to(expected).within(tolerance)
    }

    /// Same elements in any order.
    pub fn equivalent_to(expected: impl IntoValue) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::node(Node::EquivalentTo {
            expected: collection("equivalent-to", expected)?,
            options: EqualityOptions::default(),
        }))
    }

    pub fn is_nan() -> Matcher {
        Matcher::node(Node::IsNaN)
    }

    pub fn null() -> Matcher {
        Matcher::node(Node::Null)
    }

    pub fn is_true() -> Matcher {
        Matcher::node(Node::True)
    }

    pub fn is_false() -> Matcher {
        Matcher::node(Node::False)
    }

    /// Reference identity. Values without an identity never match.
    pub fn same_as(identity: &Identity) -> Matcher {
        Matcher::node(Node::SameAs(identity.clone()))
    }

    /// The value's type, or any type an object declares it implements.
    pub fn instance_of(type_tag: impl Into<String>) -> Matcher {
        Matcher::node(Node::InstanceOf(type_tag.into()))
    }

    /// The value's own type only.
    pub fn exact_type(type_tag: impl Into<String>) -> Matcher {
        Matcher::node(Node::ExactType(type_tag.into()))
    }

    pub fn compare(op: CompareOp, bound: impl IntoValue) -> Matcher {
        Matcher::node(Node::Compare {
            op,
            bound: bound.into_value(),
            comparator: Comparator::natural(),
        })
    }

    pub fn less_than(bound: impl IntoValue) -> Matcher {
        Matcher::compare(CompareOp::LessThan, bound)
    }

    pub fn at_most(bound: impl IntoValue) -> Matcher {
        Matcher::compare(CompareOp::AtMost, bound)
    }

    pub fn greater_than(bound: impl IntoValue) -> Matcher {
        Matcher::compare(CompareOp::GreaterThan, bound)
    }

    pub fn at_least(bound: impl IntoValue) -> Matcher {
        Matcher::compare(CompareOp::AtLeast, bound)
    }

    /// Inclusive range `[low, high]`.
    pub fn in_range(low: impl IntoValue, high: impl IntoValue) -> Result<Matcher, ConstructionError> {
        let (low, high) = (low.into_value(), high.into_value());
        let comparator = Comparator::natural();
        check_range(&low, &high, &comparator)?;
        Ok(Matcher::node(Node::InRange {
            low,
            high,
            comparator,
        }))
    }

    /// Ascending by the elements' natural ordering.
    pub fn ordered() -> Matcher {
        Matcher::ordered_by(KeyChain::new())
    }

    pub fn ordered_by(chain: KeyChain) -> Matcher {
        Matcher::node(Node::OrderedBy(chain))
    }

    /// The actual collection contains `item`.
    pub fn has_member(item: impl IntoValue) -> Matcher {
        Matcher::node(Node::HasMember(item.into_value()))
    }

    /// The actual value is one of the elements of `collection`.
    pub fn member_of(collection_source: impl IntoValue) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::node(Node::MemberOf(collection(
            "member-of",
            collection_source,
        )?)))
    }

    pub fn subset_of(superset: impl IntoValue) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::node(Node::SubsetOf(collection("subset-of", superset)?)))
    }

    pub fn superset_of(subset: impl IntoValue) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::node(Node::SupersetOf(collection("superset-of", subset)?)))
    }

    pub fn empty() -> Matcher {
        Matcher::node(Node::Empty)
    }

    pub fn unique() -> Matcher {
        Matcher::node(Node::Unique)
    }

    /// The property path resolves on the actual value.
    pub fn has_property(path: &str) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::node(Node::HasProperty(PropertyPath::parse(path)?)))
    }

    /// Resolve `path` on the actual value and apply `child` to the result.
    pub fn property(path: &str, child: &Matcher) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::node(Node::Property {
            path: PropertyPath::parse(path)?,
            child: child.clone(),
        }))
    }

    /// A captured `Err` outcome, whatever the error.
    pub fn throws_any() -> Matcher {
        Matcher::node(Node::Throws(None))
    }

    /// A captured `Err` outcome whose error value satisfies `child`, e.g.
    /// `Matcher::throws(&Matcher::exact_type("ArgumentException"))`.
    pub fn throws(child: &Matcher) -> Matcher {
        Matcher::node(Node::Throws(Some(child.clone())))
    }

    /// Anything but a captured `Err` outcome.
    pub fn throws_nothing() -> Matcher {
        Matcher::node(Node::ThrowsNothing)
    }

    pub fn starts_with(prefix: impl Into<String>) -> Matcher {
        Matcher::text(TextMatcher::new(TextPattern::StartsWith(prefix.into())))
    }

    pub fn ends_with(suffix: impl Into<String>) -> Matcher {
        Matcher::text(TextMatcher::new(TextPattern::EndsWith(suffix.into())))
    }

    pub fn contains_text(substring: impl Into<String>) -> Matcher {
        Matcher::text(TextMatcher::new(TextPattern::Contains(substring.into())))
    }

    pub fn matches_regex(pattern: &str) -> Result<Matcher, ConstructionError> {
        Ok(Matcher::text(TextMatcher::regex(pattern)?))
    }

    fn text(text: TextMatcher) -> Matcher {
        Matcher::node(Node::Text(text))
    }

    pub fn all_items(child: &Matcher) -> Matcher {
        Matcher::node(Node::AllItems(child.clone()))
    }

    pub fn some_item(child: &Matcher) -> Matcher {
        Matcher::node(Node::SomeItem(child.clone()))
    }

    pub fn no_item(child: &Matcher) -> Matcher {
        Matcher::node(Node::NoItem(child.clone()))
    }

    pub fn exactly(count: usize, child: &Matcher) -> Matcher {
        Matcher::node(Node::Exactly {
            count,
            child: child.clone(),
        })
    }

    /// Wrap a user constraint as a first-class node.
    pub fn custom(constraint: impl Constraint + 'static) -> Matcher {
        Matcher::node(Node::Custom(Arc::new(constraint)))
    }

    /// Shorthand for a custom node built from a boolean function.
    pub fn predicate<F>(description: impl Into<String>, test: F) -> Matcher
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Matcher::custom(Predicate::new(description, test))
    }

    // ── Combinators ──────────────────────────────────────────────────

    pub fn negate(&self) -> Matcher {
        Matcher::node(Node::Not(self.clone()))
    }

    pub fn and(&self, other: &Matcher) -> Matcher {
        Matcher::node(Node::And(self.clone(), other.clone()))
    }

    pub fn or(&self, other: &Matcher) -> Matcher {
        Matcher::node(Node::Or(self.clone(), other.clone()))
    }

    // ── Modifiers ────────────────────────────────────────────────────
    //
    // Each returns a new node; `self` is left untouched.

    /// Numeric tolerance for equality and equivalence.
    pub fn within(&self, tolerance: Tolerance) -> Result<Matcher, ConstructionError> {
        let tolerance = tolerance.validated()?;
        match self.0.as_ref() {
            Node::EqualTo { expected, options } => {
                numeric::check_percent_base(expected, tolerance)?;
                Ok(Matcher::node(Node::EqualTo {
                    expected: expected.clone(),
                    options: EqualityOptions {
                        tolerance,
                        ..options.clone()
                    },
                }))
            }
            Node::EquivalentTo { expected, options } => {
                for item in expected {
                    numeric::check_percent_base(item, tolerance)?;
                }
                Ok(Matcher::node(Node::EquivalentTo {
                    expected: expected.clone(),
                    options: EqualityOptions {
                        tolerance,
                        ..options.clone()
                    },
                }))
            }
            other => Err(ConstructionError::NotApplicable {
                modifier: "within",
                kind: other.kind(),
            }),
        }
    }

    /// Case-insensitive text comparison.
    pub fn ignoring_case(&self) -> Result<Matcher, ConstructionError> {
        let folded = |options: &EqualityOptions| EqualityOptions {
            ignore_case: true,
            ..options.clone()
        };
        match self.0.as_ref() {
            Node::EqualTo { expected, options } => Ok(Matcher::node(Node::EqualTo {
                expected: expected.clone(),
                options: folded(options),
            })),
            Node::EquivalentTo { expected, options } => Ok(Matcher::node(Node::EquivalentTo {
                expected: expected.clone(),
                options: folded(options),
            })),
            Node::Text(text) => Ok(Matcher::text(text.ignoring_case()?)),
            other => Err(ConstructionError::NotApplicable {
                modifier: "ignoring case",
                kind: other.kind(),
            }),
        }
    }

    /// Replace the natural ordering with `comparator`.
    pub fn using(&self, comparator: Comparator) -> Result<Matcher, ConstructionError> {
        let with_comparer = |options: &EqualityOptions| EqualityOptions {
            comparer: Some(comparator.clone()),
            ..options.clone()
        };
        match self.0.as_ref() {
            Node::EqualTo { expected, options } => Ok(Matcher::node(Node::EqualTo {
                expected: expected.clone(),
                options: with_comparer(options),
            })),
            Node::EquivalentTo { expected, options } => Ok(Matcher::node(Node::EquivalentTo {
                expected: expected.clone(),
                options: with_comparer(options),
            })),
            Node::Compare { op, bound, .. } => Ok(Matcher::node(Node::Compare {
                op: *op,
                bound: bound.clone(),
                comparator: comparator.clone(),
            })),
            Node::InRange { low, high, .. } => {
                check_range(low, high, &comparator)?;
                Ok(Matcher::node(Node::InRange {
                    low: low.clone(),
                    high: high.clone(),
                    comparator: comparator.clone(),
                }))
            }
            Node::OrderedBy(chain) => Ok(Matcher::ordered_by(chain.clone().using(comparator.clone()))),
            other => Err(ConstructionError::NotApplicable {
                modifier: "using",
                kind: other.kind(),
            }),
        }
    }
}

fn check_range(low: &Value, high: &Value, comparator: &Comparator) -> Result<(), ConstructionError> {
    let invalid = |reason: String| ConstructionError::InvalidRange {
        low: low.to_string(),
        high: high.to_string(),
        reason,
    };
    match comparator.compare(low, high) {
        Ok(Ordering::Greater) => Err(invalid("low bound is greater than high bound".to_string())),
        Ok(_) => Ok(()),
        Err(err) => Err(invalid(err.to_string())),
    }
}

// ──────────────────────────────────────────────
// Description
// ──────────────────────────────────────────────

impl Matcher {
    /// What the matcher requires, e.g. `not equal to 4`.
    pub fn describe(&self) -> String {
        self.describe_in(&EvalContext::default())
    }

    pub(crate) fn describe_in(&self, ctx: &EvalContext) -> String {
        match self.0.as_ref() {
            Node::EqualTo { expected, options } => {
                format!("equal to {}{}", ctx.show(expected), options.describe())
            }
            Node::EquivalentTo { expected, options } => format!(
                "equivalent to {}{}",
                ctx.show(&Value::List(expected.clone())),
                options.describe()
            ),
            Node::IsNaN => "NaN".to_string(),
            Node::Null => "null".to_string(),
            Node::True => "true".to_string(),
            Node::False => "false".to_string(),
            Node::SameAs(id) => format!("same as {}", Value::Opaque(id.clone())),
            Node::InstanceOf(tag) => format!("instance of {}", tag),
            Node::ExactType(tag) => format!("of exact type {}", tag),
            Node::Compare {
                op,
                bound,
                comparator,
            } => format!("{} {}{}", op, ctx.show(bound), using_suffix(comparator)),
            Node::InRange {
                low,
                high,
                comparator,
            } => format!(
                "in range [{}, {}]{}",
                ctx.show(low),
                ctx.show(high),
                using_suffix(comparator)
            ),
            Node::OrderedBy(chain) => format!("ordered {}", chain),
            Node::HasMember(item) => format!("collection containing {}", ctx.show(item)),
            Node::MemberOf(items) => format!("member of {}", ctx.show(&Value::List(items.clone()))),
            Node::SubsetOf(items) => format!("subset of {}", ctx.show(&Value::List(items.clone()))),
            Node::SupersetOf(items) => {
                format!("superset of {}", ctx.show(&Value::List(items.clone())))
            }
            Node::Empty => "empty".to_string(),
            Node::Unique => "all items unique".to_string(),
            Node::HasProperty(path) => format!("property {}", path),
            Node::Property { path, child } => {
                format!("property {} {}", path, child.describe_in(ctx))
            }
            Node::Text(text) => text.to_string(),
            Node::AllItems(child) => format!("all items {}", child.describe_in(ctx)),
            Node::SomeItem(child) => format!("some item {}", child.describe_in(ctx)),
            Node::NoItem(child) => format!("no item {}", child.describe_in(ctx)),
            Node::Exactly { count, child } => {
                format!("exactly {} items {}", count, child.describe_in(ctx))
            }
            Node::Not(child) => format!("not {}", child.describe_grouped(ctx)),
            Node::And(a, b) => format!("{} and {}", a.describe_grouped(ctx), b.describe_grouped(ctx)),
            Node::Or(a, b) => format!("{} or {}", a.describe_in(ctx), b.describe_in(ctx)),
            Node::Custom(c) => c.description(),
            Node::Throws(None) => "throws an error".to_string(),
            Node::Throws(Some(child)) => format!("throws an error {}", child.describe_grouped(ctx)),
            Node::ThrowsNothing => "throws nothing".to_string(),
        }
    }

    /// Parenthesize binary combinators nested under `not` and `and`.
    fn describe_grouped(&self, ctx: &EvalContext) -> String {
        match self.0.as_ref() {
            Node::And(..) | Node::Or(..) => format!("({})", self.describe_in(ctx)),
            _ => self.describe_in(ctx),
        }
    }
}

fn using_suffix(comparator: &Comparator) -> String {
    if comparator.is_natural() {
        String::new()
    } else {
        format!(" using {}", comparator.name())
    }
}

// ──────────────────────────────────────────────
// Evaluation
// ──────────────────────────────────────────────

fn from_inequality(description: String, actual: &Value, err: Inequality) -> EvaluationResult {
    let kind = match err {
        Inequality::Diverged(_) => FailureKind::Mismatch,
        Inequality::Comparator(_) => FailureKind::Comparator,
    };
    let divergence = err.divergence().clone();
    EvaluationResult::fail(kind, description, actual.clone(), divergence.to_string())
        .with_divergence(divergence)
}

fn from_divergence(
    description: String,
    actual: &Value,
    outcome: Result<(), Divergence>,
) -> EvaluationResult {
    match outcome {
        Ok(()) => EvaluationResult::pass(description, actual.clone()),
        Err(d) => EvaluationResult::mismatch(description, actual.clone(), d.to_string())
            .with_divergence(d),
    }
}

fn not_a_collection(description: String, actual: &Value) -> EvaluationResult {
    EvaluationResult::mismatch(
        description,
        actual.clone(),
        format!("expected a collection but was {}", actual.type_name()),
    )
}

impl Matcher {
    /// Evaluate with default rendering limits.
    pub fn evaluate(&self, actual: impl IntoValue) -> EvaluationResult {
        self.eval(&actual.into_value(), &EvalContext::default())
    }

    pub fn matches(&self, actual: impl IntoValue) -> bool {
        self.evaluate(actual).passed
    }

    pub(crate) fn eval(&self, actual: &Value, ctx: &EvalContext) -> EvaluationResult {
        let result = self.eval_node(actual, ctx);
        if let Some(kind) = result.failure {
            trace!(
                matcher = %result.description,
                failure = ?kind,
                explanation = result.explanation.as_deref().unwrap_or(""),
                "matcher failed"
            );
        }
        result
    }

    fn eval_node(&self, actual: &Value, ctx: &EvalContext) -> EvaluationResult {
        let desc = self.describe_in(ctx);
        match self.0.as_ref() {
            Node::EqualTo { expected, options } => {
                let result = match structural::structural_eq(expected, actual, options, ctx) {
                    Ok(()) => EvaluationResult::pass(desc, actual.clone()),
                    Err(err) => from_inequality(desc, actual, err),
                };
                result.with_expected(expected.clone())
            }

            Node::EquivalentTo { expected, options } => {
                let Some(items) = actual.as_list() else {
                    return not_a_collection(desc, actual);
                };
                let result = match structural::equivalent(expected, items, options, ctx) {
                    Ok(()) => EvaluationResult::pass(desc, actual.clone()),
                    Err(err) => from_inequality(desc, actual, err),
                };
                result.with_expected(Value::List(expected.clone()))
            }

            Node::IsNaN => EvaluationResult::from_bool(desc, actual.clone(), numeric::is_nan(actual)),
            Node::Null => EvaluationResult::from_bool(desc, actual.clone(), actual.is_null()),
            Node::True => {
                EvaluationResult::from_bool(desc, actual.clone(), matches!(actual, Value::Bool(true)))
            }
            Node::False => {
                EvaluationResult::from_bool(desc, actual.clone(), matches!(actual, Value::Bool(false)))
            }
            Node::SameAs(id) => EvaluationResult::from_bool(
                desc,
                actual.clone(),
                matches!(actual, Value::Opaque(a) if a == id),
            ),

            Node::InstanceOf(tag) => {
                let is = match actual {
                    Value::Null => false,
                    Value::Object(obj) => obj.is_instance_of(tag),
                    other => other.type_name() == tag,
                };
                EvaluationResult::from_bool(desc, actual.clone(), is)
            }
            Node::ExactType(tag) => EvaluationResult::from_bool(
                desc,
                actual.clone(),
                !actual.is_null() && actual.type_name() == tag,
            ),

            Node::Compare {
                op,
                bound,
                comparator,
            } => {
                let result = match comparator.compare(actual, bound) {
                    Ok(ord) => EvaluationResult::from_bool(desc, actual.clone(), op.holds(ord)),
                    Err(err) => EvaluationResult::fail(
                        FailureKind::Comparator,
                        desc,
                        actual.clone(),
                        err.to_string(),
                    ),
                };
                result.with_expected(bound.clone())
            }

            Node::InRange {
                low,
                high,
                comparator,
            } => {
                let above_low = comparator.compare(actual, low).map(|o| o != Ordering::Less);
                let below_high = comparator.compare(actual, high).map(|o| o != Ordering::Greater);
                match above_low.and_then(|lo| below_high.map(|hi| lo && hi)) {
                    Ok(inside) => EvaluationResult::from_bool(desc, actual.clone(), inside),
                    Err(err) => EvaluationResult::fail(
                        FailureKind::Comparator,
                        desc,
                        actual.clone(),
                        err.to_string(),
                    ),
                }
            }

            Node::OrderedBy(chain) => {
                let Some(items) = actual.as_list() else {
                    return not_a_collection(desc, actual);
                };
                match ordering::check_ordered(items, chain) {
                    Ok(()) => EvaluationResult::pass(desc, actual.clone()),
                    Err(OrderingFailure::Violation { index }) => {
                        let d = Divergence::at_root(format!(
                            "item {} is out of order after {}",
                            ctx.show(&items[index + 1]),
                            ctx.show(&items[index])
                        ))
                        .within(Step::Index(index + 1));
                        EvaluationResult::mismatch(desc, actual.clone(), d.to_string())
                            .with_divergence(d)
                    }
                    Err(OrderingFailure::Resolution { index, error }) => {
                        let d = Divergence::at_root(error.to_string()).within(Step::Index(index));
                        EvaluationResult::fail(
                            FailureKind::Resolution,
                            desc,
                            actual.clone(),
                            d.to_string(),
                        )
                        .with_divergence(d)
                    }
                    Err(OrderingFailure::Comparator { index, error }) => {
                        let d = Divergence::at_root(format!(
                            "cannot order item {} against item {}: {}",
                            index + 1,
                            index,
                            error
                        ))
                        .within(Step::Index(index + 1));
                        EvaluationResult::fail(
                            FailureKind::Comparator,
                            desc,
                            actual.clone(),
                            d.to_string(),
                        )
                        .with_divergence(d)
                    }
                }
            }

            Node::HasMember(item) => {
                let result = match actual {
                    Value::List(items) => {
                        from_divergence(desc, actual, containment::has_member(items, item, ctx))
                    }
                    Value::Map(entries) => {
                        let values: Vec<Value> = entries.values().cloned().collect();
                        from_divergence(desc, actual, containment::has_member(&values, item, ctx))
                    }
                    _ => not_a_collection(desc, actual),
                };
                result.with_expected(item.clone())
            }

            Node::MemberOf(items) => EvaluationResult::from_bool(
                desc,
                actual.clone(),
                structural::occurs_in(items, actual, ctx),
            )
            .with_expected(Value::List(items.clone())),

            Node::SubsetOf(superset) => {
                let result = match actual.as_list() {
                    Some(items) => {
                        from_divergence(desc, actual, containment::subset_of(items, superset, ctx))
                    }
                    None => not_a_collection(desc, actual),
                };
                result.with_expected(Value::List(superset.clone()))
            }

            Node::SupersetOf(subset) => {
                let result = match actual.as_list() {
                    Some(items) => {
                        from_divergence(desc, actual, containment::superset_of(items, subset, ctx))
                    }
                    None => not_a_collection(desc, actual),
                };
                result.with_expected(Value::List(subset.clone()))
            }

            Node::Empty => match containment::is_empty(actual) {
                Some(empty) => EvaluationResult::from_bool(desc, actual.clone(), empty),
                None => EvaluationResult::mismatch(
                    desc,
                    actual.clone(),
                    format!("expected a collection or text but was {}", actual.type_name()),
                ),
            },

            Node::Unique => match actual.as_list() {
                Some(items) => from_divergence(desc, actual, containment::unique(items, ctx)),
                None => not_a_collection(desc, actual),
            },

            Node::HasProperty(path) => match path.resolve(actual) {
                Ok(_) => EvaluationResult::pass(desc, actual.clone()),
                Err(err) => EvaluationResult::mismatch(desc, actual.clone(), err.to_string()),
            },

            Node::Property { path, child } => match path.resolve(actual) {
                Ok(value) => {
                    let inner = child.eval(&value, ctx);
                    if inner.passed {
                        return EvaluationResult::pass(desc, actual.clone());
                    }
                    let explanation = format!(
                        "property {} was {}: {}",
                        path,
                        ctx.show(&value),
                        inner.explanation.as_deref().unwrap_or("did not match")
                    );
                    let mut result = EvaluationResult::fail(
                        inner.failure.unwrap_or(FailureKind::Mismatch),
                        desc,
                        actual.clone(),
                        explanation,
                    );
                    result.expected = inner.expected;
                    result.divergence = inner
                        .divergence
                        .map(|d| d.within(Step::Key(path.as_str().to_string())));
                    result
                }
                Err(err) => EvaluationResult::fail(
                    FailureKind::Resolution,
                    desc,
                    actual.clone(),
                    err.to_string(),
                ),
            },

            Node::Text(text) => match actual {
                Value::Text(s) => EvaluationResult::from_bool(desc, actual.clone(), text.is_match(s)),
                other => EvaluationResult::mismatch(
                    desc,
                    actual.clone(),
                    format!("expected text but was {}", other.type_name()),
                ),
            },

            Node::AllItems(child) => {
                let Some(items) = actual.as_list() else {
                    return not_a_collection(desc, actual);
                };
                for (i, item) in items.iter().enumerate() {
                    let r = child.eval(item, ctx);
                    if !r.passed {
                        return item_failure(desc, actual, i, r);
                    }
                }
                EvaluationResult::pass(desc, actual.clone())
            }

            Node::SomeItem(child) => {
                let Some(items) = actual.as_list() else {
                    return not_a_collection(desc, actual);
                };
                let mut first_error = None;
                for (i, item) in items.iter().enumerate() {
                    let r = child.eval(item, ctx);
                    if r.passed {
                        return EvaluationResult::pass(desc, actual.clone());
                    }
                    if r.is_error() && first_error.is_none() {
                        first_error = Some((i, r));
                    }
                }
                match first_error {
                    Some((i, r)) => item_failure(desc, actual, i, r),
                    None => EvaluationResult::mismatch(desc, actual.clone(), "no item matched"),
                }
            }

            Node::NoItem(child) => {
                let Some(items) = actual.as_list() else {
                    return not_a_collection(desc, actual);
                };
                for (i, item) in items.iter().enumerate() {
                    let r = child.eval(item, ctx);
                    if r.is_error() {
                        return item_failure(desc, actual, i, r);
                    }
                    if r.passed {
                        let d = Divergence::at_root(format!("item {} matched", ctx.show(item)))
                            .within(Step::Index(i));
                        return EvaluationResult::mismatch(desc, actual.clone(), d.to_string())
                            .with_divergence(d);
                    }
                }
                EvaluationResult::pass(desc, actual.clone())
            }

            Node::Exactly { count, child } => {
                let Some(items) = actual.as_list() else {
                    return not_a_collection(desc, actual);
                };
                let mut matched = 0;
                for (i, item) in items.iter().enumerate() {
                    let r = child.eval(item, ctx);
                    if r.is_error() {
                        return item_failure(desc, actual, i, r);
                    }
                    if r.passed {
                        matched += 1;
                    }
                }
                if matched == *count {
                    EvaluationResult::pass(desc, actual.clone())
                } else {
                    EvaluationResult::mismatch(
                        desc,
                        actual.clone(),
                        format!("{} items matched", matched),
                    )
                }
            }

            Node::Not(child) => {
                let inner = child.eval(actual, ctx);
                if inner.is_error() {
                    return inner.with_description(desc);
                }
                if inner.passed {
                    let explanation = format!("was {}", ctx.show(actual));
                    EvaluationResult::mismatch(desc, actual.clone(), explanation)
                } else {
                    EvaluationResult::pass(desc, actual.clone())
                }
            }

            Node::And(a, b) => {
                let left = a.eval(actual, ctx);
                if !left.passed {
                    return left.with_description(desc);
                }
                let right = b.eval(actual, ctx);
                if !right.passed {
                    return right.with_description(desc);
                }
                EvaluationResult::pass(desc, actual.clone())
            }

            Node::Or(a, b) => {
                let left = a.eval(actual, ctx);
                if left.passed {
                    return EvaluationResult::pass(desc, actual.clone());
                }
                let right = b.eval(actual, ctx);
                if right.passed {
                    return EvaluationResult::pass(desc, actual.clone());
                }
                let kind = [left.failure, right.failure]
                    .into_iter()
                    .flatten()
                    .find(|k| k.is_error())
                    .unwrap_or(FailureKind::Mismatch);
                let explanation = format!(
                    "{}; {}",
                    left.explanation.as_deref().unwrap_or("left side failed"),
                    right.explanation.as_deref().unwrap_or("right side failed")
                );
                EvaluationResult::fail(kind, desc, actual.clone(), explanation)
            }

            Node::Custom(constraint) => constraint.apply(actual),

            Node::Throws(child) => {
                let Some(err) = actual.as_failure() else {
                    return EvaluationResult::mismatch(
                        desc,
                        actual.clone(),
                        format!("no error was raised; returned {}", ctx.show(actual)),
                    );
                };
                let Some(child) = child else {
                    return EvaluationResult::pass(desc, actual.clone());
                };
                let inner = child.eval(err, ctx);
                if inner.passed {
                    return EvaluationResult::pass(desc, actual.clone());
                }
                let explanation = format!(
                    "raised {}: {}",
                    ctx.show(err),
                    inner.explanation.as_deref().unwrap_or("did not match")
                );
                let mut result = EvaluationResult::fail(
                    inner.failure.unwrap_or(FailureKind::Mismatch),
                    desc,
                    actual.clone(),
                    explanation,
                );
                result.divergence = inner.divergence;
                result
            }

            Node::ThrowsNothing => match actual.as_failure() {
                Some(err) => EvaluationResult::mismatch(
                    desc,
                    actual.clone(),
                    format!("raised {}", ctx.show(err)),
                ),
                None => EvaluationResult::pass(desc, actual.clone()),
            },
        }
    }
}

/// Lift an element's failure to the collection level.
fn item_failure(
    description: String,
    actual: &Value,
    index: usize,
    inner: EvaluationResult,
) -> EvaluationResult {
    let explanation = format!(
        "item {}: {}",
        index,
        inner.explanation.as_deref().unwrap_or("did not match")
    );
    let mut result = EvaluationResult::fail(
        inner.failure.unwrap_or(FailureKind::Mismatch),
        description,
        actual.clone(),
        explanation,
    );
    let divergence = inner
        .divergence
        .unwrap_or_else(|| Divergence::at_root(inner.description))
        .within(Step::Index(index));
    result.divergence = Some(divergence);
    result
}

impl Constraint for Matcher {
    fn description(&self) -> String {
        self.describe()
    }

    fn apply(&self, actual: &Value) -> EvaluationResult {
        self.eval(actual, &EvalContext::default())
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.describe()).finish()
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

// ──────────────────────────────────────────────
// Operators
// ──────────────────────────────────────────────

impl ops::Not for Matcher {
    type Output = Matcher;

    fn not(self) -> Matcher {
        self.negate()
    }
}

impl ops::Not for &Matcher {
    type Output = Matcher;

    fn not(self) -> Matcher {
        self.negate()
    }
}

impl ops::BitAnd for Matcher {
    type Output = Matcher;

    fn bitand(self, rhs: Matcher) -> Matcher {
        self.and(&rhs)
    }
}

impl ops::BitAnd for &Matcher {
    type Output = Matcher;

    fn bitand(self, rhs: &Matcher) -> Matcher {
        self.and(rhs)
    }
}

impl ops::BitOr for Matcher {
    type Output = Matcher;

    fn bitor(self, rhs: Matcher) -> Matcher {
        self.or(&rhs)
    }
}

impl ops::BitOr for &Matcher {
    type Output = Matcher;

    fn bitor(self, rhs: &Matcher) -> Matcher {
        self.or(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::Object;

    #[test]
    fn negation_survives_reuse() {
        let not_four = Matcher::equal_to(4).negate();
        assert!(not_four.evaluate(5).passed);
        assert!(not_four.evaluate(6).passed);
        let r = not_four.evaluate(4);
        assert!(!r.passed);
        assert_eq!(r.description, "not equal to 4");
        assert_eq!(r.explanation.as_deref(), Some("was 4"));
    }

    #[test]
    fn composing_does_not_change_the_parts() {
        let gt = Matcher::greater_than(800);
        let lt = Matcher::less_than(900);
        let range = gt.and(&lt);
        let either = gt.or(&lt.negate());
        assert!(range.matches(850));
        assert!(!range.matches(950));
        assert!(either.matches(950));
        assert_eq!(gt.describe(), "greater than 800");
        assert_eq!(lt.describe(), "less than 900");
    }

    #[test]
    fn operators_build_the_same_trees() {
        let m = Matcher::less_than(100) | Matcher::greater_than(200);
        assert!(m.matches(50));
        assert!(m.matches(500));
        assert!(!m.matches(150));
        let in_band = &Matcher::greater_than(45) & &Matcher::less_than(70);
        assert!(in_band.matches(55));
        assert!((!Matcher::equal_to(false)).matches(true));
    }

    #[test]
    fn descriptions_group_nested_combinators() {
        let m = Matcher::equal_to(1).or(&Matcher::equal_to(2)).negate();
        assert_eq!(m.describe(), "not (equal to 1 or equal to 2)");
        let m = Matcher::greater_than(0).and(&Matcher::less_than(5).or(&Matcher::equal_to(9)));
        assert_eq!(m.describe(), "greater than 0 and (less than 5 or equal to 9)");
    }

    #[test]
    fn within_applies_only_to_equality() {
        assert!(matches!(
            Matcher::less_than(1).within(Tolerance::Absolute(0.1)),
            Err(ConstructionError::NotApplicable { modifier: "within", kind: "comparison" })
        ));
        assert!(matches!(
            Matcher::equal_to(1.0).within(Tolerance::Absolute(-1.0)),
            Err(ConstructionError::InvalidTolerance { .. })
        ));
    }

    #[test]
    fn percent_of_zero_is_rejected_at_construction() {
        assert!(matches!(
            Matcher::equal_within(0.0, Tolerance::Percent(10.0)),
            Err(ConstructionError::PercentOfZero { .. })
        ));
        assert!(matches!(
            Matcher::equivalent_to([1, 0]).unwrap().within(Tolerance::Percent(10.0)),
            Err(ConstructionError::PercentOfZero { .. })
        ));
        assert!(Matcher::equal_within(0.0, Tolerance::Absolute(0.0)).is_ok());
    }

    #[test]
    fn modifiers_leave_the_original_untouched() {
        let exact = Matcher::equal_to("Hello");
        let folded = exact.ignoring_case().unwrap();
        assert!(!exact.matches("HELLO"));
        assert!(folded.matches("HELLO"));
        assert_eq!(folded.describe(), "equal to \"Hello\" ignoring case");
    }

    #[test]
    fn comparison_of_incomparable_values_is_a_comparator_failure() {
        let r = Matcher::greater_than(3).evaluate("three");
        assert!(!r.passed);
        assert_eq!(r.failure, Some(FailureKind::Comparator));
        assert_eq!(r.explanation.as_deref(), Some("cannot compare \"three\" with 3"));
    }

    #[test]
    fn not_does_not_invert_errors() {
        let m = Matcher::property("Missing", &Matcher::equal_to(1)).unwrap().negate();
        let r = m.evaluate(Object::new("Target"));
        assert!(!r.passed);
        assert_eq!(r.failure, Some(FailureKind::Resolution));
        assert_eq!(r.description, "not property Missing equal to 1");
    }

    #[test]
    fn range_bounds_are_validated() {
        assert!(matches!(
            Matcher::in_range(26.0, 25.0),
            Err(ConstructionError::InvalidRange { .. })
        ));
        assert!(matches!(
            Matcher::in_range(1, "z"),
            Err(ConstructionError::InvalidRange { .. })
        ));
        let m = Matcher::in_range(25.0, 26.0).unwrap();
        assert!(m.matches(25.5));
        assert!(m.matches(25));
        assert!(!m.matches(26.5));
    }

    #[test]
    fn collection_matchers_reject_scalar_arguments() {
        assert!(matches!(
            Matcher::subset_of(3),
            Err(ConstructionError::NotACollection { matcher: "subset-of", .. })
        ));
    }

    #[test]
    fn matchers_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Matcher>();
    }

    fn validate_matter(name: &str) -> Result<(), Object> {
        if ["aaa", "bbb", "ddd", "fff"].contains(&name) {
            Ok(())
        } else {
            Err(Object::new("ArgumentException")
                .implements("Exception")
                .property("Message", format!("matter not found: {}", name)))
        }
    }

    #[test]
    fn throws_inspects_the_error_value() {
        assert!(Matcher::throws_any().matches(validate_matter("foo")));
        assert!(Matcher::throws_nothing().matches(validate_matter("aaa")));
        assert!(Matcher::throws(&Matcher::exact_type("ArgumentException")).matches(validate_matter("foo")));
        assert!(!Matcher::throws(&Matcher::exact_type("Exception")).matches(validate_matter("foo")));
        assert!(Matcher::throws(&Matcher::instance_of("Exception")).matches(validate_matter("foo")));

        let with_message = Matcher::exact_type("ArgumentException")
            .and(&Matcher::property("Message", &Matcher::starts_with("matter not found")).unwrap())
            .and(&Matcher::property("Message", &Matcher::contains_text("foo")).unwrap());
        assert!(Matcher::throws(&with_message).matches(validate_matter("foo")));
    }

    #[test]
    fn throws_explains_what_happened() {
        let r = Matcher::throws_any().evaluate(validate_matter("aaa"));
        assert!(!r.passed);
        assert_eq!(r.explanation.as_deref(), Some("no error was raised; returned null"));

        let r = Matcher::throws_nothing().evaluate(validate_matter("foo"));
        assert_eq!(
            r.explanation.as_deref(),
            Some("raised ArgumentException { Message: \"matter not found: foo\" }")
        );

        let r = Matcher::throws(&Matcher::exact_type("Exception")).evaluate(validate_matter("foo"));
        assert_eq!(r.description, "throws an error of exact type Exception");
        assert!(r.explanation.unwrap().ends_with(": was ArgumentException { Message: \"matter not found: foo\" }"));
    }

    #[test]
    fn grid_construction_errors_are_construction_errors() {
        assert!(Matcher::equal_to_grid(&[2, 2], 1..=4).unwrap().matches(vec![vec![1, 2], vec![3, 4]]));
        assert!(matches!(
            Matcher::equal_to_grid(&[2, 3], 1..=4),
            Err(ConstructionError::Normalize(_))
        ));
    }
}
