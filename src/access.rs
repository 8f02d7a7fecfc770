//! Property access into caller-defined item types.
//!
//! The query compiler never inspects items itself; the embedding
//! application supplies a [`PropertyAccessor`] mapping property names to
//! [`Value`]s. A ready-made accessor over `serde_json::Value` documents is
//! provided for the common case of filtering JSON-shaped data.

use std::cmp::Ordering;

use crate::value::{self, Number, Value};

/// Capability for reading named properties off items of type `T`.
///
/// Implementations must be thread-safe: a compiled query plan captures the
/// accessor and may be evaluated from several threads at once.
pub trait PropertyAccessor<T>: Send + Sync {
    /// The value of `property` on `item`.
    ///
    /// Unknown or unresolvable properties yield [`Value::Null`]; evaluation
    /// is total and never aborts on a missing property (null sorts before
    /// everything and equals nothing non-null, so such items simply drop
    /// out of predicated results).
    fn get(&self, item: &T, property: &str) -> Value;

    /// Ordering used for comparisons and sorting on `property`.
    ///
    /// Defaults to [`value::compare`]; override to give individual
    /// properties a custom collation.
    fn compare(&self, property: &str, a: &Value, b: &Value) -> Ordering {
        let _ = property;
        value::compare(a, b)
    }
}

/// Accessor over `serde_json::Value` objects with flat property names.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAccessor;

impl PropertyAccessor<serde_json::Value> for JsonAccessor {
    fn get(&self, item: &serde_json::Value, property: &str) -> Value {
        match item.get(property) {
            Some(field) => from_json(field),
            None => Value::Null,
        }
    }
}

/// Maps a JSON value onto the RQL value model.
///
/// Nested objects are not addressable by the flat accessor and compare by
/// their serialized form.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(Number::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Value::Number(Number::Float(f))
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(_) => Value::String(json.to_string()),
    }
}
