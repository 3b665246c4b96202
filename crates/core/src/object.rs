//! Path-addressable records and opaque identities.
//!
//! An [`Object`] is the normalized form of a user-defined record. It keeps
//! the distinction between properties (readable through an accessor, public
//! or not), write-only properties, and plain storage fields, because the
//! property resolver must only ever see the former.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::MissingReason;
use crate::normalize::IntoValue;
use crate::value::Value;

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

// ──────────────────────────────────────────────
// Identity
// ──────────────────────────────────────────────

/// An opaque reference identity. Two identities are the same only if they
/// were produced by the same call to [`Identity::fresh`] (or cloned from it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Identity {
    pub type_name: String,
    pub id: u64,
}

impl Identity {
    /// Allocate a new identity, distinct from every identity allocated before.
    pub fn fresh(type_name: impl Into<String>) -> Self {
        Identity {
            type_name: type_name.into(),
            id: NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed),
        }
    }
}

// ──────────────────────────────────────────────
// Object
// ──────────────────────────────────────────────

/// A single member of an [`Object`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Member {
    /// Public readable property.
    Property(Value),
    /// Readable property with a non-public accessor. Still resolvable.
    NonPublicProperty(Value),
    /// Property with a setter only.
    WriteOnly,
    /// Plain storage without an accessor. Never resolvable as a property.
    Field(Value),
}

/// A record with a type name, the types it is an instance of, and members.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Object {
    type_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    supertypes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    natural_key: Option<Box<Value>>,
    members: BTreeMap<String, Member>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Object {
            type_name: type_name.into(),
            supertypes: Vec::new(),
            natural_key: None,
            members: BTreeMap::new(),
        }
    }

    /// Declare a base type or interface this object is an instance of.
    pub fn implements(mut self, supertype: impl Into<String>) -> Self {
        self.supertypes.push(supertype.into());
        self
    }

    /// Give the object a natural ordering: it compares like `key` does.
    pub fn ordered_by(mut self, key: impl IntoValue) -> Self {
        self.natural_key = Some(Box::new(key.into_value()));
        self
    }

    pub fn property(self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.with_member(name, Member::Property(value.into_value()))
    }

    pub fn non_public_property(self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.with_member(name, Member::NonPublicProperty(value.into_value()))
    }

    pub fn write_only(self, name: impl Into<String>) -> Self {
        self.with_member(name, Member::WriteOnly)
    }

    pub fn field(self, name: impl Into<String>, value: impl IntoValue) -> Self {
        self.with_member(name, Member::Field(value.into_value()))
    }

    fn with_member(mut self, name: impl Into<String>, member: Member) -> Self {
        self.members.insert(name.into(), member);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn supertypes(&self) -> &[String] {
        &self.supertypes
    }

    /// True if `type_tag` is the object's own type or one of its supertypes.
    pub fn is_instance_of(&self, type_tag: &str) -> bool {
        self.type_name == type_tag || self.supertypes.iter().any(|s| s == type_tag)
    }

    pub fn natural_key(&self) -> Option<&Value> {
        self.natural_key.as_deref()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// Read a property through its accessor.
    pub fn read_property(&self, name: &str) -> Result<&Value, MissingReason> {
        match self.members.get(name) {
            Some(Member::Property(v)) | Some(Member::NonPublicProperty(v)) => Ok(v),
            Some(Member::WriteOnly) => Err(MissingReason::WriteOnly),
            Some(Member::Field(_)) => Err(MissingReason::Field),
            None => Err(MissingReason::Missing),
        }
    }

    /// All members that carry a value, in name order.
    pub fn valued_members(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.members.iter().filter_map(|(name, m)| match m {
            Member::Property(v) | Member::NonPublicProperty(v) | Member::Field(v) => {
                Some((name.as_str(), v))
            }
            Member::WriteOnly => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_identities_differ() {
        let a = Identity::fresh("Widget");
        let b = Identity::fresh("Widget");
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn read_property_distinguishes_member_kinds() {
        let target = Object::new("Target")
            .property("Size", 10)
            .non_public_property("Cost", 2.5)
            .field("Speed", 0.0)
            .write_only("Secret");

        assert_eq!(target.read_property("Size"), Ok(&Value::Int(10)));
        assert_eq!(target.read_property("Cost"), Ok(&Value::Float(2.5)));
        assert_eq!(target.read_property("Speed"), Err(MissingReason::Field));
        assert_eq!(target.read_property("Secret"), Err(MissingReason::WriteOnly));
        assert_eq!(target.read_property("Nope"), Err(MissingReason::Missing));
    }

    #[test]
    fn instance_of_checks_supertypes() {
        let fruit = Object::new("Fruit").implements("Plant").implements("IFood");
        assert!(fruit.is_instance_of("Fruit"));
        assert!(fruit.is_instance_of("IFood"));
        assert!(!fruit.is_instance_of("Cow"));
    }

    #[test]
    fn valued_members_skip_write_only() {
        let obj = Object::new("T").property("a", 1).write_only("b").field("c", 3);
        let names: Vec<&str> = obj.valued_members().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
