//! Container adapter: a uniform `(key, value)` view over mappings,
//! sequences and sets, plus single-key indexing.

use std::iter::Enumerate;
use std::{option, slice, str};

use crate::error::ValidationError;
use crate::value::{Node, Value};

/// Iterator over the `(key, value)` pairs of a container.
///
/// - Mappings yield their entries in insertion order.
/// - Sequences yield `(index, element)`, starting at 0.
/// - Sets yield `(element, element)`.
/// - Strings are sequences of characters and yield `(index, char)`. A single
///   character is a one-character string, so it yields `(0, itself)`.
pub enum Pairs<'a> {
    Map(indexmap::map::Iter<'a, Value, Value>),
    Seq(Enumerate<slice::Iter<'a, Value>>),
    Set(indexmap::set::Iter<'a, Value>),
    Str(Enumerate<str::Chars<'a>>),
    Char(option::IntoIter<char>),
}

impl<'a> Iterator for Pairs<'a> {
    type Item = (Node<'a>, Node<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Pairs::Map(it) => it.next().map(|(k, v)| (Node::Value(k), Node::Value(v))),
            Pairs::Seq(it) => it.next().map(|(i, v)| (Node::Index(i), Node::Value(v))),
            Pairs::Set(it) => it.next().map(|e| (Node::Value(e), Node::Value(e))),
            Pairs::Str(it) => it.next().map(|(i, c)| (Node::Index(i), Node::Char(c))),
            Pairs::Char(it) => it.next().map(|c| (Node::Index(0), Node::Char(c))),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Pairs::Map(it) => it.size_hint(),
            Pairs::Seq(it) => it.size_hint(),
            Pairs::Set(it) => it.size_hint(),
            Pairs::Str(it) => it.size_hint(),
            Pairs::Char(it) => it.size_hint(),
        }
    }
}

/// Iterate `node` as a container.
///
/// Scalars and sequence indices are not containers.
pub fn pairs(node: Node<'_>) -> Result<Pairs<'_>, ValidationError> {
    match node {
        Node::Value(Value::Map(m)) => Ok(Pairs::Map(m.iter())),
        Node::Value(Value::Seq(items)) => Ok(Pairs::Seq(items.iter().enumerate())),
        Node::Value(Value::Set(s)) => Ok(Pairs::Set(s.iter())),
        Node::Value(Value::Str(s)) => Ok(Pairs::Str(s.chars().enumerate())),
        Node::Char(c) => Ok(Pairs::Char(Some(c).into_iter())),
        other => Err(ValidationError::NotAContainer {
            found: describe(other),
        }),
    }
}

/// Index `node` with `key`, returning the stored `(key, value)` pair.
///
/// Mappings are indexed by key equality. Sequences and strings are indexed
/// by integer, with negative indices counting from the end. Everything else
/// fails.
pub fn index<'a>(node: Node<'a>, key: &Value) -> Option<(Node<'a>, Node<'a>)> {
    match (node, key) {
        (Node::Value(Value::Map(m)), _) => m
            .get_key_value(key)
            .map(|(k, v)| (Node::Value(k), Node::Value(v))),
        (Node::Value(Value::Seq(items)), Value::Int(n)) => {
            let idx = resolve(*n, items.len())?;
            items.get(idx).map(|v| (Node::Index(idx), Node::Value(v)))
        }
        (Node::Value(Value::Str(s)), Value::Int(n)) => {
            let idx = resolve(*n, s.chars().count())?;
            s.chars().nth(idx).map(|c| (Node::Index(idx), Node::Char(c)))
        }
        (Node::Char(c), Value::Int(n)) => {
            resolve(*n, 1).map(|idx| (Node::Index(idx), Node::Char(c)))
        }
        _ => None,
    }
}

/// Turn a possibly negative index into an offset below `len`.
fn resolve(n: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let idx = if n < 0 { len + n } else { n };
    if (0..len).contains(&idx) {
        usize::try_from(idx).ok()
    } else {
        None
    }
}

/// Short description of a node's shape for error messages.
pub(crate) fn describe(node: Node<'_>) -> String {
    match node {
        Node::Value(v) => v.kind_name().to_string(),
        Node::Index(_) => "index".to_string(),
        Node::Char(_) => "str".to_string(),
    }
}
