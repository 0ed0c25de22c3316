//! No-op variants returned when capture is off, when a leaf action would
//! nest too deep, or when input validation rejects a call (spec.md §9
//! "No-op variants ('Null' objects)"). Each implements the same trait as
//! its real counterpart and returns itself from any method that would
//! otherwise hand back a child.

use crate::json::JsonValue;
use crate::model::tracer::NoopTracer;
use crate::model::traits::{ActionHandle, SessionHandle, WebRequestTracerHandle};

pub struct NoopAction;

impl ActionHandle for NoopAction {
    fn id(&self) -> i64 {
        0
    }
    fn report_value_int(&self, _name: &str, _value: i32) {}
    fn report_value_double(&self, _name: &str, _value: f64) {}
    fn report_value_string(&self, _name: &str, _value: &str) {}
    fn report_event(&self, _name: &str) {}
    fn report_error(&self, _name: &str, _code: i32) {}
    fn trace_web_request(&self, _url: &str) -> Box<dyn WebRequestTracerHandle> {
        Box::new(NoopTracer)
    }
    fn enter_action(&self, _name: &str) -> Box<dyn ActionHandle> {
        Box::new(NoopAction)
    }
    fn leave_action(&self) -> i64 {
        0
    }
    fn cancel_action(&self) {}
    fn force_leave(&self) {}
}

pub struct NoopSession;

impl SessionHandle for NoopSession {
    fn identify_user(&self, _user_tag: &str) {}
    fn report_crash(&self, _error_name: &str, _reason: &str, _stacktrace: &str) {}
    fn send_event(&self, _name: &str, _attributes: JsonValue) {}
    fn send_biz_event(&self, _event_type: &str, _attributes: JsonValue) {}
    fn enter_action(&self, _name: &str) -> Box<dyn ActionHandle> {
        Box::new(NoopAction)
    }
    fn trace_web_request(&self, _url: &str) -> Box<dyn WebRequestTracerHandle> {
        Box::new(NoopTracer)
    }
    fn end(&self) {}
}
