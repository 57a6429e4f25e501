//! Predicates used by type tests (`:$name`).
//!
//! Anything implementing [`Predicate`] can be put in a [`Defs`](crate::Defs)
//! table. Plain shape checks are covered by [`Kind`] and [`AnyOf`]; richer
//! validators such as [`CommitHash`] and [`Uri`] implement arbitrary logic.

use std::fmt;
use std::ops::RangeInclusive;

use phf::{Map, phf_map};
use regex::Regex;

use crate::value::Value;

/// Accept/reject test applied to a matched value.
pub trait Predicate: Send + Sync {
    fn accepts(&self, value: &Value) -> bool;
}

impl fmt::Debug for dyn Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<predicate>")
    }
}

impl<F> Predicate for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn accepts(&self, value: &Value) -> bool {
        self(value)
    }
}

/// The shape of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Seq,
    Map,
    Set,
}

const KIND_NAMES: Map<&'static str, Kind> = phf_map! {
    "null" => Kind::Null,
    "none" => Kind::Null,
    "bool" => Kind::Bool,
    "int" => Kind::Int,
    "float" => Kind::Float,
    "str" => Kind::Str,
    "string" => Kind::Str,
    "seq" => Kind::Seq,
    "list" => Kind::Seq,
    "tuple" => Kind::Seq,
    "map" => Kind::Map,
    "dict" => Kind::Map,
    "set" => Kind::Set,
    "frozenset" => Kind::Set,
};

impl Kind {
    pub fn of(value: &Value) -> Kind {
        match value {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Float(_) => Kind::Float,
            Value::Str(_) => Kind::Str,
            Value::Seq(_) => Kind::Seq,
            Value::Map(_) => Kind::Map,
            Value::Set(_) => Kind::Set,
        }
    }

    /// Look up a kind by one of its names (`dict`, `list`, `str`, ...).
    pub fn from_name(name: &str) -> Option<Kind> {
        KIND_NAMES.get(name).copied()
    }

    /// Every recognised kind name with the kind it denotes.
    pub fn names() -> impl Iterator<Item = (&'static str, Kind)> {
        KIND_NAMES.entries().map(|(name, kind)| (*name, *kind))
    }
}

impl Predicate for Kind {
    fn accepts(&self, value: &Value) -> bool {
        Kind::of(value) == *self
    }
}

/// Accepts a value of any of the listed kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyOf(pub Vec<Kind>);

impl Predicate for AnyOf {
    fn accepts(&self, value: &Value) -> bool {
        self.0.contains(&Kind::of(value))
    }
}

/// Accepts strings shaped like a git commit id: 40 hex digits, or 64 when
/// SHA-256 ids are allowed.
#[derive(Debug, Clone)]
pub struct CommitHash {
    re: Regex,
}

impl CommitHash {
    pub fn new(sha256: bool) -> Self {
        let re = if sha256 {
            r"^(?:[0-9a-fA-F]{40}|[0-9a-fA-F]{64})$"
        } else {
            r"^[0-9a-fA-F]{40}$"
        };
        Self {
            re: Regex::new(re).expect("commit hash regex is valid"),
        }
    }
}

impl Default for CommitHash {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Predicate for CommitHash {
    fn accepts(&self, value: &Value) -> bool {
        value.as_str().is_some_and(|s| self.re.is_match(s))
    }
}

/// Accepts strings that are absolute URIs with an allowed scheme and, if a
/// port is given, a port in the allowed range.
#[derive(Debug, Clone)]
pub struct Uri {
    schemes: Vec<String>,
    ports: RangeInclusive<u16>,
}

impl Uri {
    pub fn new<S: Into<String>>(schemes: impl IntoIterator<Item = S>) -> Self {
        Self {
            schemes: schemes.into_iter().map(Into::into).collect(),
            ports: 1..=u16::MAX,
        }
    }

    pub fn with_ports(mut self, ports: RangeInclusive<u16>) -> Self {
        self.ports = ports;
        self
    }

    fn accepts_str(&self, s: &str) -> bool {
        let Some((scheme, rest)) = s.split_once(':') else {
            return false;
        };
        if !is_scheme(scheme) || !self.schemes.iter().any(|allowed| allowed == scheme) {
            return false;
        }
        let Some(rest) = rest.strip_prefix("//") else {
            // No authority, nothing more to check.
            return true;
        };
        let authority = rest
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default();
        let host_port = authority.rsplit_once('@').map_or(authority, |(_, hp)| hp);
        // Skip over a bracketed IPv6 host before looking for the port.
        let after_host = match host_port.strip_prefix('[') {
            Some(v6) => match v6.split_once(']') {
                Some((_, tail)) => tail,
                None => return false,
            },
            None => host_port.find(':').map_or("", |i| &host_port[i..]),
        };
        match after_host.strip_prefix(':') {
            None if after_host.is_empty() => true,
            None => false,
            Some("") => true,
            Some(port) => port
                .parse::<u16>()
                .is_ok_and(|port| self.ports.contains(&port)),
        }
    }
}

impl Default for Uri {
    fn default() -> Self {
        Self::new(["https"])
    }
}

impl Predicate for Uri {
    fn accepts(&self, value: &Value) -> bool {
        value.as_str().is_some_and(|s| self.accepts_str(s))
    }
}

fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
