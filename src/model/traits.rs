//! Public capability traits for sessions, actions, and web request tracers
//! (spec.md §4.10, §6 "Public API surface", §9 "No-op variants").
//!
//! Every capture-on object and its capture-off counterpart implement the
//! same trait, so callers never branch on a capture flag in a hot path —
//! they just hold a `Box<dyn ActionHandle>` and call through it.

use std::sync::Arc;

use crate::json::JsonValue;

pub trait WebRequestTracerHandle: Send + Sync {
    fn get_tag(&self) -> String;
    fn start(&self);
    fn stop(&self, response_code: i32);
    fn set_bytes_sent(&self, bytes: i64);
    fn set_bytes_received(&self, bytes: i64);
}

pub trait ActionHandle: Send + Sync {
    fn id(&self) -> i64;
    fn report_value_int(&self, name: &str, value: i32);
    fn report_value_double(&self, name: &str, value: f64);
    fn report_value_string(&self, name: &str, value: &str);
    fn report_event(&self, name: &str);
    fn report_error(&self, name: &str, code: i32);
    fn trace_web_request(&self, url: &str) -> Box<dyn WebRequestTracerHandle>;
    fn enter_action(&self, name: &str) -> Box<dyn ActionHandle>;
    fn leave_action(&self) -> i64;
    fn cancel_action(&self);

    /// Used internally when a parent closes with children still open:
    /// leave rather than cancel, per spec.md §4.6 composition rules.
    fn force_leave(&self);
}

/// Lets a stored `Arc<RealAction>` (kept in a parent's child list) also be
/// handed out as a `Box<dyn ActionHandle>` without an extra wrapper type.
impl<T: ActionHandle + ?Sized> ActionHandle for Arc<T> {
    fn id(&self) -> i64 {
        (**self).id()
    }
    fn report_value_int(&self, name: &str, value: i32) {
        (**self).report_value_int(name, value)
    }
    fn report_value_double(&self, name: &str, value: f64) {
        (**self).report_value_double(name, value)
    }
    fn report_value_string(&self, name: &str, value: &str) {
        (**self).report_value_string(name, value)
    }
    fn report_event(&self, name: &str) {
        (**self).report_event(name)
    }
    fn report_error(&self, name: &str, code: i32) {
        (**self).report_error(name, code)
    }
    fn trace_web_request(&self, url: &str) -> Box<dyn WebRequestTracerHandle> {
        (**self).trace_web_request(url)
    }
    fn enter_action(&self, name: &str) -> Box<dyn ActionHandle> {
        (**self).enter_action(name)
    }
    fn leave_action(&self) -> i64 {
        (**self).leave_action()
    }
    fn cancel_action(&self) {
        (**self).cancel_action()
    }
    fn force_leave(&self) {
        (**self).force_leave()
    }
}

pub trait SessionHandle: Send + Sync {
    fn identify_user(&self, user_tag: &str);
    fn report_crash(&self, error_name: &str, reason: &str, stacktrace: &str);
    fn send_event(&self, name: &str, attributes: JsonValue);
    fn send_biz_event(&self, event_type: &str, attributes: JsonValue);
    fn enter_action(&self, name: &str) -> Box<dyn ActionHandle>;
    fn trace_web_request(&self, url: &str) -> Box<dyn WebRequestTracerHandle>;
    fn end(&self);
}
