//! Generic tree values that patterns are matched against.
//!
//! [`Value`] owns the data. [`Node`] is the borrowed view the matcher hands
//! out for keys and values: either a reference into the tree, or a sequence
//! index or string character, which have no stored counterpart.

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

/// A tree-shaped value: scalars, sequences, mappings and sets.
///
/// Mappings and sets keep insertion order. Equality and hashing of mappings
/// and sets ignore order, so they can themselves be used as keys.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    /// Compared and hashed by bit pattern.
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Map(IndexMap<Value, Value>),
    Set(IndexSet<Value>),
}

// Constructors
impl Value {
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn seq<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    pub fn set<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Set(items.into_iter().map(Into::into).collect())
    }
}

// Accessors
impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<Value, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Short name of the value's shape, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
            Value::Set(_) => "set",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::Seq(items) => items.hash(state),
            // Order-insensitive, to agree with IndexMap/IndexSet equality.
            Value::Map(m) => {
                m.len().hash(state);
                let sum = m
                    .iter()
                    .map(|entry| hash_one(&entry))
                    .fold(0u64, u64::wrapping_add);
                sum.hash(state);
            }
            Value::Set(s) => {
                s.len().hash(state);
                let sum = s.iter().map(hash_one).fold(0u64, u64::wrapping_add);
                sum.hash(state);
            }
        }
    }
}

fn hash_one<T: Hash>(item: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    item.hash(&mut hasher);
    hasher.finish()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Seq(items) => write!(f, "[{}]", items.iter().join(", ")),
            Value::Map(m) => write!(
                f,
                "{{{}}}",
                m.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")
            ),
            Value::Set(s) if s.is_empty() => write!(f, "set()"),
            Value::Set(s) => write!(f, "{{{}}}", s.iter().join(", ")),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Seq(items)
    }
}

/// A key or value reached while matching.
///
/// Mapping keys, set elements and stored values borrow from the tree being
/// matched. Sequence indices and the characters of a string are synthesized.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Value(&'a Value),
    Index(usize),
    /// One character of a string, itself a one-character string.
    Char(char),
}

impl<'a> Node<'a> {
    /// The borrowed tree value, if this node is not a sequence index.
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Node::Value(v) => Some(v),
            Node::Index(_) | Node::Char(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Node::Index(i) => Some(*i),
            Node::Value(_) | Node::Char(_) => None,
        }
    }

    /// The stored string, if any. A [`Node::Char`] is not stored; use
    /// [`to_value`](Self::to_value) to see it as a string.
    pub fn as_str(&self) -> Option<&'a str> {
        self.as_value().and_then(Value::as_str)
    }

    /// This node as a [`Value`], materializing sequence indices as integers
    /// and characters as strings.
    pub fn to_value(&self) -> Cow<'a, Value> {
        match self {
            Node::Value(v) => Cow::Borrowed(*v),
            Node::Index(i) => Cow::Owned(index_value(*i)),
            Node::Char(c) => Cow::Owned(Value::Str(c.to_string())),
        }
    }
}

fn index_value(i: usize) -> Value {
    Value::Int(i64::try_from(i).unwrap_or(i64::MAX))
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.to_value() == other.to_value()
    }
}

impl PartialEq<Value> for Node<'_> {
    fn eq(&self, other: &Value) -> bool {
        self.to_value().as_ref() == other
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Value(v) => write!(f, "{v}"),
            Node::Index(i) => write!(f, "{i}"),
            Node::Char(c) => write!(f, "{:?}", c.encode_utf8(&mut [0; 4])),
        }
    }
}
