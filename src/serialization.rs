//! Wire JSON form for trees.
//!
//! A node serializes as `{"deleted": true?, "eq": …?, "properties":
//! {…}?}`. Dates are wrapped as `{"$date": "<raw>"}` so consumers can
//! tell them apart from strings; links and environment references
//! serialize as `{"linkTo": "…"}` and `{"env": "…"}`. Property keys
//! keep the tree's insertion order.

use crate::tree::{Node, Scalar, Slot, Value as TreeValue};
use indexmap::IndexMap;
use serde::Serialize;

/// A generic serializable value in the wire dialect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

/// Serialize a tree into the wire [`Value`] form.
#[must_use]
pub fn to_value(node: &Node) -> Value {
    let mut out = IndexMap::new();
    if node.deleted {
        out.insert("deleted".to_string(), Value::Boolean(true));
    }
    if let Some(value) = &node.value {
        out.insert("eq".to_string(), eq_value(value));
    }
    if let Some(props) = &node.properties {
        let mut object = IndexMap::new();
        for (key, slot) in props {
            object.insert(key.clone(), slot_value(slot));
        }
        out.insert("properties".to_string(), Value::Object(object));
    }
    Value::Object(out)
}

fn slot_value(slot: &Slot) -> Value {
    match slot {
        Slot::Node(node) => to_value(node),
        Slot::Link(link) => tagged("linkTo", &link.target),
    }
}

fn eq_value(value: &TreeValue) -> Value {
    match value {
        TreeValue::Scalar(Scalar::Str(s)) => Value::String(s.clone()),
        TreeValue::Scalar(Scalar::Num(n)) => number_value(*n),
        TreeValue::Scalar(Scalar::Bool(b)) => Value::Boolean(*b),
        TreeValue::Scalar(Scalar::Date(d)) => tagged("$date", &d.raw),
        TreeValue::Array(items) => Value::Array(items.iter().map(slot_value).collect()),
        TreeValue::Env(name) => tagged("env", name),
    }
}

/// Integral doubles within f64's exact range print without a decimal
/// point.
fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 {
        Value::Integer(n as i64)
    } else {
        Value::Number(n)
    }
}

fn tagged(tag: &str, text: &str) -> Value {
    let mut out = IndexMap::new();
    out.insert(tag.to_string(), Value::String(text.to_string()));
    Value::Object(out)
}

/// Serialize a tree to a compact JSON string.
///
/// # Errors
/// Returns a `serde_json::Error` if serialization fails.
pub fn to_json(node: &Node) -> Result<String, serde_json::Error> {
    serde_json::to_string(&to_value(node))
}

/// Serialize a tree to a pretty-printed JSON string.
///
/// # Errors
/// Returns a `serde_json::Error` if serialization fails.
pub fn to_json_pretty(node: &Node) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&to_value(node))
}
