//! Action lifecycle (C6, spec.md §4.6): hierarchical, timed spans of
//! activity. A `RootAction` is a child of a session; a leaf `Action` is a
//! child of a `RootAction`. Nesting beyond two levels is not permitted.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::model::beacon::{truncate_value_field, Beacon, EventType};
use crate::model::tracer::{sanitize_url, NoopTracer, RealTracer};
use crate::model::traits::{ActionHandle, WebRequestTracerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Left,
    Cancelled,
}

pub struct RealAction {
    beacon: Arc<Beacon>,
    id: i64,
    parent_id: i64,
    name: String,
    depth: u8,
    start_timestamp_ms: i64,
    start_sequence: i64,
    end_sequence: AtomicI64,
    state: Mutex<State>,
    children: Mutex<Vec<Arc<RealAction>>>,
}

impl RealAction {
    pub fn new(beacon: Arc<Beacon>, parent_id: i64, name: impl Into<String>, depth: u8, now_ms: i64) -> Arc<Self> {
        let id = beacon.next_action_id();
        let name = name.into();
        let start_sequence = beacon.add_record(EventType::Action, id, now_ms, &[("na", &name)]);
        Arc::new(RealAction {
            beacon,
            id,
            parent_id,
            name,
            depth,
            start_timestamp_ms: now_ms,
            start_sequence,
            end_sequence: AtomicI64::new(-1),
            state: Mutex::new(State::Open),
            children: Mutex::new(Vec::new()),
        })
    }

    fn is_open(&self) -> bool {
        *self.state.lock() == State::Open
    }

    fn register_child(&self, child: Arc<RealAction>) {
        self.children.lock().push(child);
    }

    /// Closes every remaining open child, in reverse insertion order
    /// (spec.md §4.6 composition rule), by leaving rather than cancelling.
    fn close_children(&self) {
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.into_iter().rev() {
            child.force_leave();
        }
    }
}

impl ActionHandle for RealAction {
    fn id(&self) -> i64 {
        self.id
    }

    fn report_value_int(&self, name: &str, value: i32) {
        if !self.is_open() {
            return;
        }
        let name = truncate_value_field(name);
        self.beacon.add_record(
            EventType::ValueInt,
            self.id,
            self.start_timestamp_ms,
            &[("na", &name), ("vl", &value.to_string())],
        );
    }

    fn report_value_double(&self, name: &str, value: f64) {
        if !self.is_open() {
            return;
        }
        if !value.is_finite() {
            debug!(name, "dropping non-finite double value report");
            return;
        }
        let name = truncate_value_field(name);
        self.beacon.add_record(
            EventType::ValueDouble,
            self.id,
            self.start_timestamp_ms,
            &[("na", &name), ("vl", &value.to_string())],
        );
    }

    fn report_value_string(&self, name: &str, value: &str) {
        if !self.is_open() {
            return;
        }
        let name = truncate_value_field(name);
        let value = truncate_value_field(value);
        self.beacon.add_record(
            EventType::ValueString,
            self.id,
            self.start_timestamp_ms,
            &[("na", &name), ("vl", &value)],
        );
    }

    fn report_event(&self, name: &str) {
        if !self.is_open() || name.is_empty() {
            return;
        }
        self.beacon.add_record(
            EventType::NamedEvent,
            self.id,
            self.start_timestamp_ms,
            &[("na", name)],
        );
    }

    fn report_error(&self, name: &str, code: i32) {
        if !self.is_open() {
            return;
        }
        self.beacon.add_record(
            EventType::Error,
            self.id,
            self.start_timestamp_ms,
            &[("na", name), ("ec", &code.to_string())],
        );
    }

    fn trace_web_request(&self, url: &str) -> Box<dyn WebRequestTracerHandle> {
        match sanitize_url(url) {
            Some(sanitized) if self.is_open() => {
                let tracer = RealTracer::new(self.beacon.clone(), self.id, sanitized, &self.id.to_string());
                Box::new(tracer)
            }
            _ => Box::new(NoopTracer),
        }
    }

    fn enter_action(&self, name: &str) -> Box<dyn ActionHandle> {
        if self.depth >= 1 || !self.is_open() {
            // Nesting beyond two levels is not permitted; a leaf calling
            // enter_action returns a no-op (spec.md §4.6).
            return Box::new(crate::model::noop::NoopAction);
        }
        let child = RealAction::new(self.beacon.clone(), self.id, name, self.depth + 1, self.start_timestamp_ms);
        self.register_child(child.clone());
        Box::new(child)
    }

    fn leave_action(&self) -> i64 {
        let mut state = self.state.lock();
        if *state != State::Open {
            return self.id;
        }
        *state = State::Left;
        drop(state);

        self.close_children();

        let end_sequence = self.beacon.add_record(EventType::Action, self.id, self.start_timestamp_ms, &[]);
        self.end_sequence.store(end_sequence, Ordering::Relaxed);
        self.id
    }

    fn cancel_action(&self) {
        let mut state = self.state.lock();
        if *state != State::Open {
            return;
        }
        *state = State::Cancelled;
        drop(state);

        let children = std::mem::take(&mut *self.children.lock());
        for child in children {
            child.cancel_action();
        }
    }

    fn force_leave(&self) {
        self.leave_action();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BeaconCache;
    use crate::config::{CacheLimits, CrashReportingLevel, DataCollectionLevel, TrustMode};
    use crate::model::ids::IdProvider;

    fn test_config() -> crate::config::AgentConfig {
        crate::config::AgentConfig {
            endpoint_url: "https://example.com".to_string(),
            application_id: "app".to_string(),
            device_id: 1,
            agent_version: "1.0".to_string(),
            os_name: "test".to_string(),
            manufacturer: "test".to_string(),
            model_id: "test".to_string(),
            trust_mode: TrustMode::Strict,
            cache_limits: CacheLimits::default(),
            data_collection_level: DataCollectionLevel::Performance,
            crash_reporting_level: CrashReportingLevel::OptOutCrashes,
            platform_type: 1,
        }
    }

    fn beacon() -> Arc<Beacon> {
        let cache = Arc::new(BeaconCache::new());
        Arc::new(Beacon::new(1, cache, test_config(), Arc::new(IdProvider::new()), 0))
    }

    #[test]
    fn leaf_enter_action_on_leaf_is_noop() {
        let b = beacon();
        let root = RealAction::new(b, 0, "root", 0, 0);
        let leaf = root.enter_action("leaf");
        let grandchild = leaf.enter_action("grandchild");
        // no panic, and the grandchild id should differ from leaf's
        assert_ne!(grandchild.id(), leaf.id());
    }

    #[test]
    fn end_sequence_exceeds_every_child_end_sequence_on_leave() {
        let b = beacon();
        let root = RealAction::new(b, 0, "root", 0, 0);
        let leaf = RealAction::new(root.beacon.clone(), root.id, "leaf", 1, 0);
        root.register_child(leaf.clone());

        root.leave_action();

        let leaf_end = leaf.end_sequence.load(Ordering::Relaxed);
        let root_end = root.end_sequence.load(Ordering::Relaxed);
        assert!(root_end > leaf_end);
    }

    #[test]
    fn cancel_discards_children_without_emitting_end_record() {
        let b = beacon();
        let root = RealAction::new(b, 0, "root", 0, 0);
        let _leaf = root.enter_action("leaf");
        root.cancel_action();
        // second cancel/leave is a no-op
        root.cancel_action();
    }
}
