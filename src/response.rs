//! Response decoder (C2): legacy `k=v&…` and JSON server responses into a
//! [`ResponseAttributes`] record with a per-field "was-set" bitset and a
//! write-wins-only-if-set merge rule (spec.md §3, §4.2).

use crate::error::AgentError;
use crate::json::{self, JsonValue};

/// Per-field "was-set" bitset (spec.md §3). Hand-rolled rather than pulling
/// in a bitflags crate — fifteen named bits over a `u32` with a handful of
/// set operations isn't worth a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SetFields(u32);

impl SetFields {
    pub const MAX_BEACON_SIZE: SetFields = SetFields(1 << 0);
    pub const MAX_SESSION_DURATION: SetFields = SetFields(1 << 1);
    pub const MAX_EVENTS: SetFields = SetFields(1 << 2);
    pub const SESSION_TIMEOUT: SetFields = SetFields(1 << 3);
    pub const SEND_INTERVAL: SetFields = SetFields(1 << 4);
    pub const VISIT_STORE_VERSION: SetFields = SetFields(1 << 5);
    pub const MULTIPLICITY: SetFields = SetFields(1 << 6);
    pub const SERVER_ID: SetFields = SetFields(1 << 7);
    pub const APPLICATION_ID: SetFields = SetFields(1 << 8);
    pub const CAPTURE: SetFields = SetFields(1 << 9);
    pub const CAPTURE_CRASHES: SetFields = SetFields(1 << 10);
    pub const CAPTURE_ERRORS: SetFields = SetFields(1 << 11);
    pub const TRAFFIC_CONTROL_PCT: SetFields = SetFields(1 << 12);
    pub const STATUS: SetFields = SetFields(1 << 13);
    pub const TIMESTAMP: SetFields = SetFields(1 << 14);

    pub fn empty() -> Self {
        SetFields(0)
    }

    pub fn insert(&mut self, other: SetFields) {
        self.0 |= other.0;
    }

    pub fn contains(&self, other: SetFields) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(&self, other: SetFields) -> SetFields {
        SetFields(self.0 | other.0)
    }
}

/// Immutable record returned by C2 (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseAttributes {
    pub max_beacon_size_bytes: i64,
    pub max_session_duration_ms: i64,
    pub max_events_per_session: i64,
    pub session_timeout_ms: i64,
    pub send_interval_ms: i64,
    pub visit_store_version: i64,
    pub multiplicity: i64,
    pub server_id: i64,
    pub application_id: String,
    pub capture: bool,
    pub capture_crashes: bool,
    pub capture_errors: bool,
    pub traffic_control_percentage: i64,
    pub status: String,
    pub timestamp_ms: i64,
    pub set_fields: SetFields,
}

impl Default for ResponseAttributes {
    fn default() -> Self {
        ResponseAttributes {
            max_beacon_size_bytes: 30 * 1024,
            max_session_duration_ms: -1,
            max_events_per_session: -1,
            session_timeout_ms: 6 * 60 * 1000,
            send_interval_ms: 2 * 60 * 1000,
            visit_store_version: 1,
            multiplicity: 1,
            server_id: 1,
            application_id: String::new(),
            capture: true,
            capture_crashes: true,
            capture_errors: true,
            traffic_control_percentage: 100,
            status: String::new(),
            timestamp_ms: 0,
            set_fields: SetFields::empty(),
        }
    }
}

impl ResponseAttributes {
    /// Merges `new` into `self`: a field is taken from `new` iff its bit in
    /// `new.set_fields` is set; otherwise `self`'s value is kept.
    pub fn merge(&self, new: &ResponseAttributes) -> ResponseAttributes {
        macro_rules! merged {
            ($field:ident, $bit:ident) => {
                if new.set_fields.contains(SetFields::$bit) {
                    new.$field.clone()
                } else {
                    self.$field.clone()
                }
            };
        }
        ResponseAttributes {
            max_beacon_size_bytes: merged!(max_beacon_size_bytes, MAX_BEACON_SIZE),
            max_session_duration_ms: merged!(max_session_duration_ms, MAX_SESSION_DURATION),
            max_events_per_session: merged!(max_events_per_session, MAX_EVENTS),
            session_timeout_ms: merged!(session_timeout_ms, SESSION_TIMEOUT),
            send_interval_ms: merged!(send_interval_ms, SEND_INTERVAL),
            visit_store_version: merged!(visit_store_version, VISIT_STORE_VERSION),
            multiplicity: merged!(multiplicity, MULTIPLICITY),
            server_id: merged!(server_id, SERVER_ID),
            application_id: merged!(application_id, APPLICATION_ID),
            capture: merged!(capture, CAPTURE),
            capture_crashes: merged!(capture_crashes, CAPTURE_CRASHES),
            capture_errors: merged!(capture_errors, CAPTURE_ERRORS),
            traffic_control_percentage: merged!(traffic_control_percentage, TRAFFIC_CONTROL_PCT),
            status: merged!(status, STATUS),
            timestamp_ms: merged!(timestamp_ms, TIMESTAMP),
            set_fields: self.set_fields.union(new.set_fields),
        }
    }
}

/// Parses a server response body into a [`ResponseAttributes`] delta.
///
/// Dispatch: `"type=m"` or a `"type=m&"` prefix selects the legacy
/// key-value decoder; anything else is treated as JSON.
pub fn parse(text: &str) -> Result<ResponseAttributes, AgentError> {
    if text == "type=m" || text.starts_with("type=m&") {
        Ok(parse_legacy(text))
    } else {
        parse_json(text)
    }
}

fn parse_legacy(text: &str) -> ResponseAttributes {
    let mut attrs = ResponseAttributes::default();
    attrs.set_fields = SetFields::empty();

    for pair in text.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "bl" => {
                if let Ok(kib) = value.parse::<i64>() {
                    attrs.max_beacon_size_bytes = kib * 1024;
                    attrs.set_fields.insert(SetFields::MAX_BEACON_SIZE);
                }
            }
            "si" => {
                if let Ok(secs) = value.parse::<i64>() {
                    attrs.send_interval_ms = secs * 1000;
                    attrs.set_fields.insert(SetFields::SEND_INTERVAL);
                }
            }
            "bn" => {
                // Monitor name: no dedicated ResponseAttributes field in
                // spec.md's data model; recognized but intentionally a no-op.
            }
            "id" => {
                if let Ok(id) = value.parse::<i64>() {
                    attrs.server_id = id;
                    attrs.set_fields.insert(SetFields::SERVER_ID);
                }
            }
            "cp" => {
                // Parse as signed 32-bit; exactly 1 is on (spec.md §9 open
                // question resolution).
                let on = value.parse::<i32>() == Ok(1);
                attrs.capture = on;
                attrs.set_fields.insert(SetFields::CAPTURE);
            }
            "er" => {
                let off = value.parse::<i32>() == Ok(0);
                attrs.capture_errors = !off;
                attrs.set_fields.insert(SetFields::CAPTURE_ERRORS);
            }
            "cr" => {
                let off = value.parse::<i32>() == Ok(0);
                attrs.capture_crashes = !off;
                attrs.set_fields.insert(SetFields::CAPTURE_CRASHES);
            }
            _ => {}
        }
    }
    attrs
}

fn parse_json(text: &str) -> Result<ResponseAttributes, AgentError> {
    let root = json::parse(text)?;
    let mut attrs = ResponseAttributes::default();
    attrs.set_fields = SetFields::empty();

    let obj = root.as_object();

    if let Some(mobile) = obj.and_then(|o| o.get("mobileAgentConfig")).and_then(JsonValue::as_object) {
        if let Some(n) = mobile.get("maxBeaconSizeKb").and_then(JsonValue::as_number) {
            attrs.max_beacon_size_bytes = n.as_i64() * 1024;
            attrs.set_fields.insert(SetFields::MAX_BEACON_SIZE);
        }
        if let Some(n) = mobile.get("maxSessionDurationMins").and_then(JsonValue::as_number) {
            attrs.max_session_duration_ms = n.as_i64() * 60_000;
            attrs.set_fields.insert(SetFields::MAX_SESSION_DURATION);
        }
        if let Some(n) = mobile.get("maxEventsPerSession").and_then(JsonValue::as_number) {
            attrs.max_events_per_session = n.as_i64();
            attrs.set_fields.insert(SetFields::MAX_EVENTS);
        }
        if let Some(n) = mobile.get("sessionTimeoutSec").and_then(JsonValue::as_number) {
            attrs.session_timeout_ms = n.as_i64() * 1000;
            attrs.set_fields.insert(SetFields::SESSION_TIMEOUT);
        }
        if let Some(n) = mobile.get("sendIntervalSec").and_then(JsonValue::as_number) {
            attrs.send_interval_ms = n.as_i64() * 1000;
            attrs.set_fields.insert(SetFields::SEND_INTERVAL);
        }
        if let Some(n) = mobile.get("visitStoreVersion").and_then(JsonValue::as_number) {
            attrs.visit_store_version = n.as_i64();
            attrs.set_fields.insert(SetFields::VISIT_STORE_VERSION);
        }
    }

    if let Some(app) = obj.and_then(|o| o.get("appConfig")).and_then(JsonValue::as_object) {
        if let Some(n) = app.get("capture").and_then(JsonValue::as_number) {
            attrs.capture = n.as_i64() == 1;
            attrs.set_fields.insert(SetFields::CAPTURE);
        }
        if let Some(n) = app.get("reportCrashes").and_then(JsonValue::as_number) {
            attrs.capture_crashes = n.as_i64() != 0;
            attrs.set_fields.insert(SetFields::CAPTURE_CRASHES);
        }
        if let Some(n) = app.get("reportErrors").and_then(JsonValue::as_number) {
            attrs.capture_errors = n.as_i64() != 0;
            attrs.set_fields.insert(SetFields::CAPTURE_ERRORS);
        }
        if let Some(n) = app.get("trafficControlPercentage").and_then(JsonValue::as_number) {
            attrs.traffic_control_percentage = n.as_i64();
            attrs.set_fields.insert(SetFields::TRAFFIC_CONTROL_PCT);
        }
        if let Some(s) = app.get("applicationId").and_then(JsonValue::as_str) {
            attrs.application_id = s.to_string();
            attrs.set_fields.insert(SetFields::APPLICATION_ID);
        }
    }

    if let Some(dynamic) = obj.and_then(|o| o.get("dynamicConfig")).and_then(JsonValue::as_object) {
        if let Some(n) = dynamic.get("multiplicity").and_then(JsonValue::as_number) {
            attrs.multiplicity = n.as_i64();
            attrs.set_fields.insert(SetFields::MULTIPLICITY);
        }
        if let Some(n) = dynamic.get("serverId").and_then(JsonValue::as_number) {
            attrs.server_id = n.as_i64();
            attrs.set_fields.insert(SetFields::SERVER_ID);
        }
        if let Some(s) = dynamic.get("status").and_then(JsonValue::as_str) {
            attrs.status = s.to_string();
            attrs.set_fields.insert(SetFields::STATUS);
        }
    }

    if let Some(n) = obj.and_then(|o| o.get("timestamp")).and_then(JsonValue::as_number) {
        attrs.timestamp_ms = n.as_i64();
        attrs.set_fields.insert(SetFields::TIMESTAMP);
    }

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_capture_on_requires_exactly_one() {
        let attrs = parse_legacy("type=m&cp=1&bl=100");
        assert!(attrs.capture);
        assert_eq!(attrs.max_beacon_size_bytes, 100 * 1024);
    }

    #[test]
    fn legacy_capture_off_for_any_other_value() {
        assert!(!parse_legacy("type=m&cp=0").capture);
        assert!(!parse_legacy("type=m&cp=-7").capture);
        assert!(!parse_legacy("type=m&cp=2").capture);
    }

    #[test]
    fn json_response_merges_only_set_fields() {
        let defaults = ResponseAttributes::default();
        let delta = parse(r#"{"appConfig":{"capture":0}}"#).unwrap();
        let merged = defaults.merge(&delta);
        assert!(!merged.capture);
        assert_eq!(merged.send_interval_ms, defaults.send_interval_ms);
    }

    #[test]
    fn unit_conversions_match_table() {
        let delta = parse(
            r#"{"mobileAgentConfig":{"maxBeaconSizeKb":30,"maxSessionDurationMins":2,"sessionTimeoutSec":360,"sendIntervalSec":120}}"#,
        )
        .unwrap();
        assert_eq!(delta.max_beacon_size_bytes, 30 * 1024);
        assert_eq!(delta.max_session_duration_ms, 2 * 60_000);
        assert_eq!(delta.session_timeout_ms, 360_000);
        assert_eq!(delta.send_interval_ms, 120_000);
    }

    #[test]
    fn dispatches_on_type_m_prefix() {
        assert!(parse("type=m&cp=1").is_ok());
        assert!(parse("type=m").is_ok());
        assert!(parse(r#"{"timestamp":5}"#).is_ok());
    }
}
