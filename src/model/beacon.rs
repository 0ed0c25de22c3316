//! Beacon serializer (C7, spec.md §4.7): converts session/action/tracer
//! mutations into URL-encoded `k=v&…` records and appends them to the
//! beacon cache under the owning session's id.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

use crate::cache::BeaconCache;
use crate::config::AgentConfig;
use crate::model::ids::IdProvider;

const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const MAX_REASON_CHARS: usize = 1000;
const MAX_STACKTRACE_CHARS: usize = 128_000;
const MAX_VALUE_FIELD_BYTES: usize = 250;

/// Closed event-type enum (spec.md §4.7). Numeric values match the wire
/// protocol's `et` field exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Action = 1,
    NamedEvent = 10,
    ValueString = 11,
    ValueInt = 12,
    ValueDouble = 13,
    SessionStart = 18,
    SessionEnd = 19,
    WebRequest = 30,
    Error = 40,
    Crash = 50,
    IdentifyUser = 60,
    Event = 98,
}

impl EventType {
    fn wire_code(self) -> i32 {
        self as i32
    }

    /// Actions use the `actions` sequence; everything else uses `events`.
    fn is_action(self) -> bool {
        matches!(self, EventType::Action)
    }
}

pub fn percent_encode(value: &str) -> String {
    percent_encoding::utf8_percent_encode(value, UNRESERVED).to_string()
}

pub fn truncate_reason(text: &str) -> String {
    truncate_chars(text, MAX_REASON_CHARS)
}

/// Truncates to `MAX_STACKTRACE_CHARS`, backing up to the last newline
/// before the limit so no line is cut mid-way (spec.md §4.7).
pub fn truncate_stacktrace(text: &str) -> String {
    if text.chars().count() <= MAX_STACKTRACE_CHARS {
        return text.to_string();
    }
    let truncated = truncate_chars(text, MAX_STACKTRACE_CHARS);
    match truncated.rfind('\n') {
        Some(idx) => truncated[..idx].to_string(),
        None => truncated,
    }
}

/// A value report's name, key, or value exceeding 250 bytes truncates to
/// 250 bytes (spec.md §4.7), on a UTF-8 boundary.
pub fn truncate_value_field(text: &str) -> String {
    if text.len() <= MAX_VALUE_FIELD_BYTES {
        return text.to_string();
    }
    let mut end = MAX_VALUE_FIELD_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Per-session serializer bound to the beacon cache (spec.md §3 "Beacon").
pub struct Beacon {
    pub session_id: i64,
    cache: Arc<BeaconCache>,
    config: AgentConfig,
    action_ids: Arc<IdProvider>,
    next_sequence: AtomicI64,
    session_start_ms: i64,
}

impl Beacon {
    pub fn new(session_id: i64, cache: Arc<BeaconCache>, config: AgentConfig, action_ids: Arc<IdProvider>, session_start_ms: i64) -> Self {
        Beacon {
            session_id,
            cache,
            config,
            action_ids,
            next_sequence: AtomicI64::new(0),
            session_start_ms,
        }
    }

    pub fn next_action_id(&self) -> i64 {
        self.action_ids.next_id()
    }

    pub fn next_sequence_number(&self) -> i64 {
        self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Builds one `k=v&…` record and appends it to the cache. `action_id`
    /// is `0` for session-level records. `extra` fields are percent-encoded
    /// and appended in order.
    pub fn add_record(&self, event_type: EventType, action_id: i64, timestamp_ms: i64, extra: &[(&str, &str)]) -> i64 {
        let sequence = self.next_sequence_number();
        let time_offset = timestamp_ms - self.session_start_ms;

        let mut parts = vec![
            format!("et={}", event_type.wire_code()),
            format!("pa={action_id}"),
            format!("s0={sequence}"),
            format!("t0={time_offset}"),
        ];
        for (key, value) in extra {
            parts.push(format!("{key}={}", percent_encode(value)));
        }
        let record = parts.join("&");

        if event_type.is_action() {
            self.cache.add_action(self.session_id, timestamp_ms, record);
        } else {
            self.cache.add_event(self.session_id, timestamp_ms, record);
        }
        sequence
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}
