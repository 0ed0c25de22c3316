//! JSON value serializer.
//!
//! Mirrors `util::json::writer::JsonWriter` from the original OpenKit
//! implementation: a minimal, compact writer with no insignificant
//! whitespace, `\uXXXX` escapes for control characters, and round-trippable
//! number formatting.

use crate::json::value::{JsonNumber, JsonObject, JsonValue};

/// Serializes `value` to a compact JSON string.
pub fn write(value: &JsonValue) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &JsonValue, out: &mut String) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(true) => out.push_str("true"),
        JsonValue::Bool(false) => out.push_str("false"),
        JsonValue::Number(n) => write_number(n, out),
        JsonValue::String(s) => write_string(s, out),
        JsonValue::Array(items) => write_array(items, out),
        JsonValue::Object(obj) => write_object(obj, out),
    }
}

fn write_number(n: &JsonNumber, out: &mut String) {
    if n.is_finite() {
        out.push_str(n.literal());
    } else {
        // JSON has no representation for NaN/Infinity; spec.md §4.6 rejects
        // these before they ever reach the writer, but fall back to `null`
        // rather than emit invalid JSON if one slips through.
        out.push_str("null");
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) <= 0x1F => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

fn write_array(items: &[JsonValue], out: &mut String) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_value(item, out);
    }
    out.push(']');
}

fn write_object(obj: &JsonObject, out: &mut String) {
    out.push('{');
    for (i, (key, value)) in obj.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, out);
        out.push(':');
        write_value(value, out);
    }
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parser::parse;

    #[test]
    fn writes_compact_object_with_no_whitespace() {
        let mut obj = JsonObject::new();
        obj.insert("a".to_string(), JsonValue::Number(JsonNumber::from_i64(1)));
        obj.insert("b".to_string(), JsonValue::Bool(true));
        assert_eq!(write(&JsonValue::Object(obj)), r#"{"a":1,"b":true}"#);
    }

    #[test]
    fn escapes_control_characters_and_quotes() {
        let value = JsonValue::String("a\tb\"c\\d".to_string());
        assert_eq!(write(&value), r#""a\tb\"c\\d""#);
    }

    #[test]
    fn round_trips_through_parser() {
        let original = parse(r#"{"x":[1,2.5,"y",null,true,false]}"#).unwrap();
        let rendered = write(&original);
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn non_finite_number_falls_back_to_null() {
        let value = JsonValue::Number(JsonNumber::from_f64(f64::NAN));
        assert_eq!(write(&value), "null");
    }
}
