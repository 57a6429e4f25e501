//! ABDL: a pattern language for walking and validating tree-shaped data.
//!
//! A pattern describes a path of indexing and iteration steps through nested
//! mappings, sequences and sets. Matching it against a [`Value`] lazily
//! yields every way the path can be walked, as a map of named captures.
//!
//! # Example
//!
//! ```rust
//! use abdl::{Defs, Kind, Value, compile};
//!
//! let tree = Value::map([("foo", Value::Int(1)), ("bar", Value::map([("baz", 2)]))]);
//! let defs = Defs::new().with_kind("dict", Kind::Map);
//!
//! // Every entry whose value is a mapping, then every entry of that mapping.
//! let pattern = compile("->X:?$dict->Y", &defs).unwrap();
//! let mut matches = pattern.matches(&tree);
//!
//! let found = matches.next().unwrap().unwrap();
//! assert_eq!(found["X"].0, Value::from("bar"));
//! assert_eq!(found["Y"].0, Value::from("baz"));
//! assert_eq!(found["Y"].1, Value::Int(2));
//!
//! assert!(matches.next().is_none());
//! ```
//!
//! See [`pattern`] for the syntax.

pub mod code;
pub mod compiler;
pub mod container;
mod defs;
mod error;
pub mod json;
pub mod pattern;
mod predicate;
mod value;

pub use code::CompiledPattern;
pub use compiler::{compile, match_tree};
pub use defs::{Def, Defs};
pub use error::{PatternError, PatternErrorKind, ValidationError};
pub use pattern::{Bindings, Matches, Op};
pub use predicate::{AnyOf, CommitHash, Kind, Predicate, Uri};
pub use value::{Node, Value};
