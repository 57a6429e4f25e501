//! Conversions between JSON documents and [`Value`] trees.

use serde_json::{Map, Number, Value as Json};

use crate::pattern::Bindings;
use crate::value::{Node, Value};

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s),
            Json::Array(items) => Value::Seq(items.into_iter().map(Value::from).collect()),
            Json::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (Value::Str(k), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Render a value as JSON.
///
/// Sets become arrays. Mapping keys that aren't strings are written in
/// their display form. Non-finite floats become `null`.
pub fn to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(n) => Json::from(*n),
        Value::Float(x) => Number::from_f64(*x).map_or(Json::Null, Json::Number),
        Value::Str(s) => Json::String(s.clone()),
        Value::Seq(items) => items.iter().map(to_json).collect(),
        Value::Set(items) => items.iter().map(to_json).collect(),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| (key_string(k), to_json(v)))
                .collect::<Map<_, _>>(),
        ),
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::Str(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn node_to_json(node: Node<'_>) -> Json {
    match node {
        Node::Value(v) => to_json(v),
        Node::Index(i) => Json::from(i),
        Node::Char(c) => Json::String(c.to_string()),
    }
}

/// Render one match as `{"name": [key, value], ...}`.
pub fn bindings_to_json(bindings: &Bindings<'_>) -> Json {
    Json::Object(
        bindings
            .iter()
            .map(|(name, (key, value))| {
                (
                    name.to_string(),
                    Json::Array(vec![node_to_json(*key), node_to_json(*value)]),
                )
            })
            .collect(),
    )
}
