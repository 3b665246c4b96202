//! Ordering checks over a chain of sort keys.
//!
//! A sequence is ordered under a [`KeyChain`] when every adjacent pair is
//! non-violating: the first key decides unless the pair ties on it, in which
//! case the next key decides, and so on. A pair that ties on every key is
//! fine.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use attest_core::{PathNotFound, PropertyPath, Value};

use crate::comparator::Comparator;
use crate::error::{CompareError, ConstructionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "ascending"),
            Direction::Descending => write!(f, "descending"),
        }
    }
}

type KeyFn = dyn Fn(&Value) -> Value + Send + Sync;

/// How a sort key is pulled out of an element.
#[derive(Clone)]
pub enum KeyExtractor {
    /// The element itself.
    Identity,
    Property(PropertyPath),
    Function { name: String, extract: Arc<KeyFn> },
}

impl KeyExtractor {
    fn extract(&self, element: &Value) -> Result<Value, PathNotFound> {
        match self {
            KeyExtractor::Identity => Ok(element.clone()),
            KeyExtractor::Property(path) => path.resolve(element),
            KeyExtractor::Function { extract, .. } => Ok(extract(element)),
        }
    }
}

impl fmt::Debug for KeyExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyExtractor::Identity => write!(f, "Identity"),
            KeyExtractor::Property(path) => write!(f, "Property({})", path),
            KeyExtractor::Function { name, .. } => write!(f, "Function({})", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SortKey {
    pub extractor: KeyExtractor,
    pub direction: Direction,
    pub comparator: Comparator,
}

impl SortKey {
    fn identity() -> Self {
        SortKey {
            extractor: KeyExtractor::Identity,
            direction: Direction::Ascending,
            comparator: Comparator::natural(),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.direction)?;
        match &self.extractor {
            KeyExtractor::Identity => {}
            KeyExtractor::Property(path) => write!(f, " by {}", path)?,
            KeyExtractor::Function { name, .. } => write!(f, " by {}", name)?,
        }
        if !self.comparator.is_natural() {
            write!(f, " using {}", self.comparator.name())?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// KeyChain
// ──────────────────────────────────────────────

/// An ordered list of sort keys, built by value:
///
/// ```
/// use attest_eval::ordering::KeyChain;
///
/// let chain = KeyChain::new()
///     .by("Part")
///     .unwrap()
///     .then_by("SubPart")
///     .unwrap()
///     .descending();
/// assert_eq!(chain.to_string(), "ascending by Part, then descending by SubPart");
/// ```
///
/// Direction and comparator modifiers apply to the most recently added key.
/// An empty chain orders the elements themselves, ascending.
#[derive(Debug, Clone, Default)]
pub struct KeyChain {
    keys: Vec<SortKey>,
}

impl KeyChain {
    pub fn new() -> Self {
        KeyChain::default()
    }

    /// Add a key read from a property path.
    pub fn by(self, path: &str) -> Result<Self, ConstructionError> {
        let path = PropertyPath::parse(path)?;
        Ok(self.push(KeyExtractor::Property(path)))
    }

    /// Same as [`KeyChain::by`]; reads better after the first key.
    pub fn then_by(self, path: &str) -> Result<Self, ConstructionError> {
        self.by(path)
    }

    /// Add a key computed by a function.
    pub fn by_key<F>(self, name: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.push(KeyExtractor::Function {
            name: name.into(),
            extract: Arc::new(extract),
        })
    }

    pub fn ascending(self) -> Self {
        self.modify_last(|key| key.direction = Direction::Ascending)
    }

    pub fn descending(self) -> Self {
        self.modify_last(|key| key.direction = Direction::Descending)
    }

    pub fn using(self, comparator: Comparator) -> Self {
        self.modify_last(|key| key.comparator = comparator)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    fn push(mut self, extractor: KeyExtractor) -> Self {
        self.keys.push(SortKey {
            extractor,
            ..SortKey::identity()
        });
        self
    }

    fn modify_last(mut self, f: impl FnOnce(&mut SortKey)) -> Self {
        if self.keys.is_empty() {
            self.keys.push(SortKey::identity());
        }
        if let Some(last) = self.keys.last_mut() {
            f(last);
        }
        self
    }

    fn effective_keys(&self) -> Vec<SortKey> {
        if self.keys.is_empty() {
            vec![SortKey::identity()]
        } else {
            self.keys.clone()
        }
    }
}

impl fmt::Display for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.effective_keys().iter().enumerate() {
            if i > 0 {
                write!(f, ", then ")?;
            }
            write!(f, "{}", key)?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Check
// ──────────────────────────────────────────────

/// Why a sequence is not ordered.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderingFailure {
    /// `items[index]` and `items[index + 1]` are out of order.
    Violation { index: usize },
    /// A key could not be extracted from `items[index]`.
    Resolution { index: usize, error: PathNotFound },
    /// Keys of `items[index]` and `items[index + 1]` could not be compared.
    Comparator { index: usize, error: CompareError },
}

/// Check every adjacent pair of `items` against the chain.
pub fn check_ordered(items: &[Value], chain: &KeyChain) -> Result<(), OrderingFailure> {
    let keys = chain.effective_keys();

    let mut extracted = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let row = keys
            .iter()
            .map(|key| key.extractor.extract(item))
            .collect::<Result<Vec<Value>, PathNotFound>>()
            .map_err(|error| OrderingFailure::Resolution { index, error })?;
        extracted.push(row);
    }

    for (index, pair) in extracted.windows(2).enumerate() {
        let (left, right) = (&pair[0], &pair[1]);
        for (k, key) in keys.iter().enumerate() {
            let ord = key
                .comparator
                .compare(&left[k], &right[k])
                .map_err(|error| OrderingFailure::Comparator { index, error })?;
            let ord = match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            match ord {
                Ordering::Less => break,
                Ordering::Equal => continue,
                Ordering::Greater => return Err(OrderingFailure::Violation { index }),
            }
        }
    }
    Ok(())
}
