//! JSON value tree.
//!
//! Corresponds to `util::json::objects::{JsonNullValue, JsonBooleanValue,
//! JsonNumberValue, JsonStringValue, JsonArrayValue, JsonObjectValue}` in the
//! original implementation. Objects keep insertion order (closest Rust
//! analog of the original's backing `unordered_map` plus the fact that
//! insertion order is what a hand &written parser naturally produces) but
//! compare structurally regardless of order, per spec.md §8.

use std::fmt;

/// A parsed JSON number: keeps the original lexeme (for exact round-trip of
/// values a lexer already validated) and a parsed `f64` for numeric access.
#[derive(Debug, Clone)]
pub struct JsonNumber {
    literal: String,
    value: f64,
}

impl JsonNumber {
    pub fn from_literal(literal: impl Into<String>) -> Self {
        let literal = literal.into();
        let value = literal.parse().unwrap_or(f64::NAN);
        JsonNumber { literal, value }
    }

    pub fn from_f64(value: f64) -> Self {
        JsonNumber {
            literal: format_f64(value),
            value,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        JsonNumber {
            literal: value.to_string(),
            value: value as f64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.value
    }

    pub fn as_i32(&self) -> i32 {
        self.value as i32
    }

    pub fn as_i64(&self) -> i64 {
        self.value as i64
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    pub fn is_finite(&self) -> bool {
        self.value.is_finite()
    }
}

impl PartialEq for JsonNumber {
    fn eq(&self, other: &Self) -> bool {
        // Two lexemes for the same value (e.g. "1.0" and "1") are distinct
        // literals but the same number; compare on parsed value like the
        // original `JsonNumberValue::operator==`.
        self.value == other.value
    }
}

/// An ordered `(key, value)` map with duplicate-key-replaces-previous
/// semantics (spec.md §4.1 "Duplicate keys ... REPLACE previous values").
#[derive(Debug, Clone, Default)]
pub struct JsonObject {
    entries: Vec<(String, JsonValue)>,
}

impl JsonObject {
    pub fn new() -> Self {
        JsonObject {
            entries: Vec::new(),
        }
    }

    /// Inserts `value` under `key`. If `key` already exists, its value is
    /// replaced in place (position unchanged); the spec documents this as
    /// "last write wins".
    pub fn insert(&mut self, key: String, value: JsonValue) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, JsonValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for JsonObject {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, v)| other.get(k).is_some_and(|ov| ov == v))
    }
}

impl FromIterator<(String, JsonValue)> for JsonObject {
    fn from_iter<T: IntoIterator<Item = (String, JsonValue)>>(iter: T) -> Self {
        let mut obj = JsonObject::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}

/// A parsed or constructed JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(JsonNumber),
    String(String),
    Array(Vec<JsonValue>),
    Object(JsonObject),
}

impl JsonValue {
    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            JsonValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&JsonNumber> {
        match self {
            JsonValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// True if this value, or any value nested inside it, is a non-finite
    /// number (NaN or +/-infinity). Used by event-payload validation
    /// (spec.md §4.6).
    pub fn contains_non_finite(&self) -> bool {
        match self {
            JsonValue::Number(n) => !n.is_finite(),
            JsonValue::Array(items) => items.iter().any(JsonValue::contains_non_finite),
            JsonValue::Object(obj) => obj.iter().any(|(_, v)| v.contains_non_finite()),
            _ => false,
        }
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::json::writer::write(self))
    }
}

/// Enough-precision, locale-invariant float formatting (decimal point
/// always `'.'`), matching the "round-trippable `max_digits10`" requirement
/// of spec.md §4.1.
pub(crate) fn format_f64(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", ryu_like(value))
    }
}

/// Rust's default `f64` `Display` already produces the shortest string that
/// round-trips; we only need to guarantee a `.` decimal point, which it
/// always uses (no locale dependence in `core::fmt`).
fn ryu_like(value: f64) -> String {
    format!("{value}")
}
