//! attest-core: value model for the Attest constraint engine.
//!
//! Every "actual" and "expected" value the engine looks at is first
//! normalized into a [`Value`], so that comparisons never care whether a
//! sequence started life as an array, a `Vec`, a `VecDeque` or a lazily
//! produced iterator.
//!
//! # Public API
//!
//! - [`Value`] -- the normalized tagged union
//! - [`IntoValue`] -- normalization from Rust values (including `Result` outcomes)
//! - [`Restartable`] -- lazy sequence source that can be normalized repeatedly
//! - [`Object`], [`Member`], [`Identity`] -- path-addressable records and opaque identities
//! - [`PropertyPath`] -- validated dotted property path with [`PropertyPath::resolve`]
//! - [`CoreError`], [`NormalizeError`], [`PathNotFound`] -- error types

pub mod error;
pub mod normalize;
pub mod object;
pub mod path;
pub mod value;

// ── Convenience re-exports ───────────────────────────────────────────

pub use error::{CoreError, MissingReason, NormalizeError, PathNotFound};
pub use normalize::{IntoValue, Restartable};
pub use object::{Identity, Member, Object};
pub use path::PropertyPath;
pub use value::Value;
