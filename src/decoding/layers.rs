//! Tolerant field access over the decoder's JSON layer tree.
//!
//! tshark's `-T json` output nests every field under its protocol
//! (`layers.ip["ip.src"]`), wraps repeated fields in arrays, and older or
//! post-processed dumps sometimes flatten everything into the top-level
//! `layers` object. `Layers` hides those shapes: a lookup by dotted key
//! returns a single scalar or nothing, never an error.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::str::FromStr;

/// Read-only view over the `layers` object of one decoded frame.
#[derive(Debug, Clone, Copy)]
pub struct Layers<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> Layers<'a> {
    /// Locates `_source.layers` (tshark's shape), falling back to `layers`,
    /// and finally to an empty view.
    pub fn of(item: &'a Value) -> Self {
        let fields = item
            .pointer("/_source/layers")
            .and_then(Value::as_object)
            .or_else(|| item.get("layers").and_then(Value::as_object));
        Self { fields }
    }

    /// Returns the scalar stored under `key`.
    ///
    /// The flat key is tried first, then the same key inside the protocol
    /// namespace named by its first segment (`tcp.flags` inside `tcp`).
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        let fields = self.fields?;
        if let Some(value) = fields.get(key).and_then(first_scalar) {
            return Some(value);
        }
        let namespace = key.split('.').next()?;
        let nested = fields.get(namespace).and_then(first_object)?;
        nested.get(key).and_then(first_scalar)
    }

    /// Text form of a field. Empty strings count as absent.
    pub fn text(&self, key: &str) -> Option<Cow<'a, str>> {
        match self.get(key)? {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            Value::Number(n) => Some(Cow::Owned(n.to_string())),
            Value::Bool(b) => Some(Cow::Owned(b.to_string())),
            _ => None,
        }
    }

    /// Parses a field, yielding `None` when absent or malformed.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.text(key)?.trim().parse().ok()
    }

    /// Whether the frame carries any field at all.
    pub fn is_empty(&self) -> bool {
        self.fields.map_or(true, Map::is_empty)
    }
}

fn first_scalar(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.first().filter(|v| !v.is_array() && !v.is_object()),
        Value::Object(_) | Value::Null => None,
        scalar => Some(scalar),
    }
}

fn first_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Array(items) => items.first().and_then(Value::as_object),
        other => other.as_object(),
    }
}
