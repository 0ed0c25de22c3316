//! Web request tracer (C6, spec.md §3, §4.6): a child of an action or
//! session that reports a traced HTTP request's timing and byte counts.

use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;

use crate::model::beacon::{Beacon, EventType};
use crate::model::traits::WebRequestTracerHandle;

/// Accepts only `[A-Za-z][A-Za-z0-9+\-.]*://…` and strips query/fragment,
/// per spec.md §4.6 "Tracing rules for URL".
pub fn sanitize_url(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
        return None;
    }

    let rest = &url[scheme_end + 3..];
    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    Some(format!("{scheme}://{}", &rest[..end]))
}

pub struct RealTracer {
    beacon: Arc<Beacon>,
    action_id: i64,
    url: String,
    tag: String,
    start_sequence: i64,
    end_sequence: AtomicI64,
    bytes_sent: AtomicI64,
    bytes_received: AtomicI64,
    response_code: AtomicI32,
}

impl RealTracer {
    pub fn new(beacon: Arc<Beacon>, action_id: i64, url: String, parent_tag: &str) -> Self {
        let start_sequence = beacon.next_sequence_number();
        let tag = format!("{parent_tag}_{start_sequence}");
        RealTracer {
            beacon,
            action_id,
            url,
            tag,
            start_sequence,
            end_sequence: AtomicI64::new(-1),
            bytes_sent: AtomicI64::new(-1),
            bytes_received: AtomicI64::new(-1),
            response_code: AtomicI32::new(-1),
        }
    }
}

impl WebRequestTracerHandle for RealTracer {
    fn get_tag(&self) -> String {
        self.tag.clone()
    }

    fn start(&self) {
        self.beacon.add_record(EventType::WebRequest, self.action_id, 0, &[("url", &self.url)]);
    }

    fn stop(&self, response_code: i32) {
        self.response_code.store(response_code, Ordering::Relaxed);
        let end_sequence = self.beacon.add_record(
            EventType::WebRequest,
            self.action_id,
            0,
            &[
                ("url", &self.url),
                ("rc", &response_code.to_string()),
                ("bs", &self.bytes_sent.load(Ordering::Relaxed).to_string()),
                ("br", &self.bytes_received.load(Ordering::Relaxed).to_string()),
            ],
        );
        self.end_sequence.store(end_sequence, Ordering::Relaxed);
    }

    fn set_bytes_sent(&self, bytes: i64) {
        self.bytes_sent.store(bytes, Ordering::Relaxed);
    }

    fn set_bytes_received(&self, bytes: i64) {
        self.bytes_received.store(bytes, Ordering::Relaxed);
    }
}

/// No-op variant returned when capture is off, or the traced URL fails
/// validation (spec.md §4.6, §9).
pub struct NoopTracer;

impl WebRequestTracerHandle for NoopTracer {
    fn get_tag(&self) -> String {
        String::new()
    }
    fn start(&self) {}
    fn stop(&self, _response_code: i32) {}
    fn set_bytes_sent(&self, _bytes: i64) {}
    fn set_bytes_received(&self, _bytes: i64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_scheme_and_strips_query() {
        let sanitized = sanitize_url("https://example.com/path?x=1#frag").unwrap();
        assert_eq!(sanitized, "https://example.com/path");
    }

    #[test]
    fn rejects_url_without_valid_scheme() {
        assert!(sanitize_url("not a url").is_none());
        assert!(sanitize_url("1http://example.com").is_none());
        assert!(sanitize_url("ht!tp://example.com").is_none());
    }
}
