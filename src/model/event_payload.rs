//! Event payload construction for `send_event`/`send_biz_event`
//! (spec.md §4.6): a JSON object built from reserved keys the agent
//! controls plus caller-supplied attributes, with reserved-key protection
//! and a non-finite-number rejection rule.

use tracing::warn;

use crate::config::AgentConfig;
use crate::json::{JsonObject, JsonValue};

/// Keys the caller may never override directly. `dt.agent.*` is exempt
/// from the broader `dt`/`dt.`-prefix reservation below.
const RESERVED_KEYS: &[&str] = &[
    "event.kind",
    "timestamp",
    "event.provider",
    "app.version",
    "os.name",
    "device.manufacturer",
    "device.model.identifier",
];

fn is_reserved_prefix(key: &str) -> bool {
    if key.starts_with("dt.agent.") {
        return false;
    }
    key == "dt" || key.starts_with("dt.")
}

/// Builds the JSON payload for `send_event`/`send_biz_event`. Returns
/// `None` if the caller's attributes contain a non-finite number anywhere
/// (the event is rejected, per spec.md §4.6).
pub fn build_event_payload(
    config: &AgentConfig,
    event_kind: &str,
    timestamp_ms: i64,
    caller_attributes: &JsonObject,
) -> Option<JsonObject> {
    if caller_attributes
        .iter()
        .any(|(_, v)| v.contains_non_finite())
    {
        warn!("dropping event with non-finite numeric attribute");
        return None;
    }

    let mut payload = JsonObject::new();
    payload.insert("event.kind".to_string(), JsonValue::String(event_kind.to_string()));
    payload.insert(
        "timestamp".to_string(),
        JsonValue::Number(crate::json::JsonNumber::from_i64(timestamp_ms)),
    );
    payload.insert(
        "event.provider".to_string(),
        JsonValue::String(config.application_id.clone()),
    );
    payload.insert(
        "app.version".to_string(),
        JsonValue::String(config.agent_version.clone()),
    );
    payload.insert("os.name".to_string(), JsonValue::String(config.os_name.clone()));
    payload.insert(
        "device.manufacturer".to_string(),
        JsonValue::String(config.manufacturer.clone()),
    );
    payload.insert(
        "device.model.identifier".to_string(),
        JsonValue::String(config.model_id.clone()),
    );

    for (key, value) in caller_attributes.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) || is_reserved_prefix(key) {
            warn!(key, "dropping reserved event attribute key");
            continue;
        }
        payload.insert(key.clone(), value.clone());
    }

    Some(payload)
}
