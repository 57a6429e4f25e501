//! Compile-time and match-time errors.

use thiserror::Error;

use crate::defs::Defs;
use crate::pattern::Op;

/// What went wrong while compiling a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternErrorKind {
    #[error("Unfinished string")]
    UnfinishedString,
    #[error("Unfinished regex")]
    UnfinishedRegex,
    #[error("Error in string escape")]
    StringEscape,
    #[error("Error in regex escape")]
    RegexEscape,
    #[error("Unexpected token")]
    UnexpectedToken,
    #[error("Invalid regex: {0}")]
    InvalidRegex(String),
    #[error("Undefined name '{0}'")]
    UndefinedName(String),
    #[error("'{name}' must be defined as a {expected}")]
    WrongDefinition { name: String, expected: &'static str },
}

/// Raised for patterns that fail to compile.
///
/// Carries the pattern text, the definitions it was compiled against and the
/// instructions compiled before the failure, so callers can render a precise
/// diagnostic.
#[derive(Debug, Clone, Error)]
#[error("{kind} at position {pos}")]
pub struct PatternError {
    pub kind: PatternErrorKind,
    /// Character offset into `pattern`.
    pub pos: usize,
    pub pattern: String,
    pub defs: Defs,
    /// Top-level instructions compiled before the error.
    pub partial: Vec<Op>,
}

impl PatternError {
    /// Human-readable message without the position.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Raised while matching when the tree doesn't validate against the pattern.
///
/// Only validating (non-`?`) elements produce these. Because matching is
/// lazy, one may surface after earlier matches were already produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("expected a mapping, sequence or set, found {found}")]
    NotAContainer { found: String },
    #[error("missing key {key}")]
    MissingKey { key: String },
    #[error("key {key} does not match /{regex}/")]
    KeyMismatch { key: String, regex: String },
    #[error("value {value} rejected by ${name}")]
    Rejected { name: String, value: String },
}
