//! ABDL pattern compiler and matching engine.
//!
//! A pattern is a path of indexing and iteration steps through a tree.
//! Compiling it produces a flat sequence of [`Op`]s; matching walks the tree
//! against that sequence and yields one binding map per complete path.
//!
//! # Pattern syntax
//!
//! | Token         | Meaning                                                |
//! |---------------|--------------------------------------------------------|
//! | `->`          | Step into the current value                            |
//! | `name`        | Capture the selected `(key, value)` as `name`          |
//! | `'text'`      | Select the entry with string key `text`                |
//! | `/re/`        | Keep entries whose key is a string matching `re`       |
//! | `$name`       | Select the entry whose key is the defined value `name` |
//! | `:$name`      | Keep values accepted by the defined predicate `name`   |
//! | `[…]`         | Match a sub-pattern against each candidate's key       |
//! | `(…)`         | Match a sub-pattern against the current value          |
//! | `?`           | Suffix: skip mismatches instead of failing             |
//! | `:?$name`     | Skippable type test                                    |
//! | `$?name`      | Skippable parameter (same as `$name?`)                 |
//!
//! Within `'…'` and `/…/`, `%` escapes the delimiter and itself.
//! Whitespace, including newlines, may separate tokens.
//!
//! Type tests written before the first arrow apply to the value the
//! (sub-)pattern starts at, so `[:?$str]` tests a key.

pub mod matcher;
pub mod op;
pub mod parser;

pub use matcher::{Bindings, Matches};
pub use op::Op;
pub use parser::parse;
