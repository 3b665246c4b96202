//! User-overridable value ordering.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use attest_core::Value;

use crate::error::CompareError;
use crate::numeric;

type CompareFn = dyn Fn(&Value, &Value) -> Option<Ordering> + Send + Sync;

/// An ordering over values. The default is the values' natural ordering;
/// a custom comparator replaces it for equality, comparison and sort keys.
#[derive(Clone)]
pub struct Comparator {
    name: String,
    compare: Option<Arc<CompareFn>>,
}

impl Comparator {
    /// The natural ordering of the values themselves.
    pub fn natural() -> Self {
        Comparator {
            name: "natural order".to_string(),
            compare: None,
        }
    }

    /// A named custom ordering. Returning `None` reports the pair as
    /// incomparable.
    pub fn new<F>(name: impl Into<String>, compare: F) -> Self
    where
        F: Fn(&Value, &Value) -> Option<Ordering> + Send + Sync + 'static,
    {
        Comparator {
            name: name.into(),
            compare: Some(Arc::new(compare)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_natural(&self) -> bool {
        self.compare.is_none()
    }

    pub fn compare(&self, left: &Value, right: &Value) -> Result<Ordering, CompareError> {
        match &self.compare {
            None => numeric::natural_order(left, right),
            Some(f) => f(left, right).ok_or_else(|| CompareError::Declined {
                comparator: self.name.clone(),
                left: left.to_string(),
                right: right.to_string(),
            }),
        }
    }
}

impl Default for Comparator {
    fn default() -> Self {
        Comparator::natural()
    }
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Comparator").field(&self.name).finish()
    }
}
