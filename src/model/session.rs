//! Session lifecycle (C6, spec.md §3, §4.6, §4.10).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::json::{JsonObject, JsonValue};
use crate::model::action::RealAction;
use crate::model::beacon::{truncate_reason, truncate_stacktrace, Beacon, EventType};
use crate::model::event_payload::build_event_payload;
use crate::model::tracer::{sanitize_url, NoopTracer, RealTracer};
use crate::model::traits::{ActionHandle, SessionHandle, WebRequestTracerHandle};

/// Session states from spec.md §3: `New` (no configuration yet),
/// `Configured` (received server config), `Finished` (end requested),
/// `FinishedAndConfigured` (drainable by the sender).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    New,
    Configured,
    Finished,
    FinishedAndConfigured,
}

/// Shared session state the sending state machine (C8/C9) walks to decide
/// what to flush. Created by the façade, looked up by the sender registry.
pub struct SessionEntry {
    pub session_id: i64,
    pub beacon: Arc<Beacon>,
    pub lifecycle: Mutex<SessionLifecycle>,
    /// Server-resolved when absent (spec.md §3 Session data model).
    pub client_ip: Option<String>,
}

impl SessionEntry {
    pub fn mark_configured(&self) {
        let mut state = self.lifecycle.lock();
        *state = match *state {
            SessionLifecycle::New => SessionLifecycle::Configured,
            SessionLifecycle::Finished => SessionLifecycle::FinishedAndConfigured,
            other => other,
        };
    }

    pub fn mark_finished(&self) {
        let mut state = self.lifecycle.lock();
        *state = match *state {
            SessionLifecycle::Configured => SessionLifecycle::FinishedAndConfigured,
            SessionLifecycle::New => SessionLifecycle::Finished,
            other => other,
        };
    }
}

pub struct RealSession {
    entry: Arc<SessionEntry>,
    last_user_tag: Mutex<Option<String>>,
    children: Mutex<Vec<Arc<RealAction>>>,
}

impl RealSession {
    pub fn new(entry: Arc<SessionEntry>, start_timestamp_ms: i64) -> Self {
        entry
            .beacon
            .add_record(EventType::SessionStart, 0, start_timestamp_ms, &[]);
        RealSession {
            entry,
            last_user_tag: Mutex::new(None),
            children: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> i64 {
        self.entry.session_id
    }
}

impl SessionHandle for RealSession {
    fn identify_user(&self, user_tag: &str) {
        if user_tag.is_empty() {
            *self.last_user_tag.lock() = None;
        } else {
            *self.last_user_tag.lock() = Some(user_tag.to_string());
        }
        self.entry
            .beacon
            .add_record(EventType::IdentifyUser, 0, 0, &[("na", user_tag)]);
    }

    fn report_crash(&self, error_name: &str, reason: &str, stacktrace: &str) {
        if error_name.is_empty() {
            return;
        }
        let reason = truncate_reason(reason);
        let stacktrace = truncate_stacktrace(stacktrace);
        self.entry.beacon.add_record(
            EventType::Crash,
            0,
            0,
            &[("na", error_name), ("rs", &reason), ("st", &stacktrace)],
        );
    }

    fn send_event(&self, name: &str, attributes: JsonValue) {
        self.send_event_with_kind("app_event", name, attributes);
    }

    fn send_biz_event(&self, event_type: &str, attributes: JsonValue) {
        self.send_event_with_kind("biz_event", event_type, attributes);
    }

    fn enter_action(&self, name: &str) -> Box<dyn ActionHandle> {
        if name.is_empty() {
            return Box::new(crate::model::noop::NoopAction);
        }
        let action = RealAction::new(self.entry.beacon.clone(), 0, name, 0, 0);
        self.children.lock().push(action.clone());
        Box::new(action)
    }

    fn trace_web_request(&self, url: &str) -> Box<dyn WebRequestTracerHandle> {
        match sanitize_url(url) {
            Some(sanitized) => Box::new(RealTracer::new(
                self.entry.beacon.clone(),
                0,
                sanitized,
                &self.entry.session_id.to_string(),
            )),
            None => Box::new(NoopTracer),
        }
    }

    fn end(&self) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.into_iter().rev() {
            child.force_leave();
        }
        self.entry.mark_finished();
        self.entry.beacon.add_record(EventType::SessionEnd, 0, 0, &[]);
    }
}

impl RealSession {
    fn send_event_with_kind(&self, kind: &str, name: &str, attributes: JsonValue) {
        if name.is_empty() {
            return;
        }
        let caller_attrs = match &attributes {
            JsonValue::Object(o) => o.clone(),
            _ => JsonObject::new(),
        };
        let Some(payload) = build_event_payload(self.entry.beacon.config(), kind, 0, &caller_attrs) else {
            return;
        };
        let serialized = crate::json::write(&JsonValue::Object(payload));
        self.entry
            .beacon
            .add_record(EventType::Event, 0, 0, &[("na", name), ("pl", &serialized)]);
    }
}
