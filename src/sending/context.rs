//! Shared sending context (C9, spec.md §4.9): the session registry, the
//! current `ResponseAttributes` snapshot, and the shutdown flag every
//! background loop checks at its suspension points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::BeaconCache;
use crate::config::AgentConfig;
use crate::model::SessionEntry;
use crate::response::ResponseAttributes;
use crate::sending::http::{HttpCollaborator, StatusRequestParams};

pub struct SendingContext {
    pub config: AgentConfig,
    pub cache: Arc<BeaconCache>,
    pub http: Arc<dyn HttpCollaborator>,
    registry: Mutex<HashMap<i64, Arc<SessionEntry>>>,
    attributes: Mutex<Arc<ResponseAttributes>>,
    shutdown: Arc<AtomicBool>,
    init_completed: AtomicBool,
}

impl SendingContext {
    pub fn new(config: AgentConfig, cache: Arc<BeaconCache>, http: Arc<dyn HttpCollaborator>) -> Self {
        SendingContext {
            config,
            cache,
            http,
            registry: Mutex::new(HashMap::new()),
            attributes: Mutex::new(Arc::new(ResponseAttributes::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
            init_completed: AtomicBool::new(false),
        }
    }

    pub fn register_session(&self, entry: Arc<SessionEntry>) {
        self.registry.lock().insert(entry.session_id, entry);
    }

    /// Snapshot of the registry, taken under the lock so iteration during
    /// I/O doesn't hold it (spec.md §5).
    pub fn session_snapshot(&self) -> Vec<Arc<SessionEntry>> {
        self.registry.lock().values().cloned().collect()
    }

    pub fn remove_session(&self, session_id: i64) {
        self.registry.lock().remove(&session_id);
    }

    pub fn attributes(&self) -> Arc<ResponseAttributes> {
        self.attributes.lock().clone()
    }

    /// Builds the status request's fixed query parameters from the current
    /// config and the last server id the collector handed back (spec.md §11).
    pub fn status_request_params(&self) -> StatusRequestParams {
        StatusRequestParams {
            server_id: self.attributes().server_id,
            application_id: self.config.application_id.clone(),
            agent_version: self.config.agent_version.clone(),
            platform_type: self.config.platform_type,
        }
    }

    /// Replaces the attributes snapshot atomically: copy-on-write, readers
    /// keep using their own snapshot (spec.md §5).
    pub fn merge_attributes(&self, delta: &ResponseAttributes) {
        let mut slot = self.attributes.lock();
        let merged = slot.merge(delta);
        *slot = Arc::new(merged);
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn set_init_completed(&self, value: bool) {
        self.init_completed.store(value, Ordering::SeqCst);
    }

    pub fn is_init_completed(&self) -> bool {
        self.init_completed.load(Ordering::SeqCst)
    }

    /// Cancellable sleep: wakes early if shutdown is requested mid-wait
    /// (spec.md §4.8 "sleep... cancellable by the shutdown signal").
    pub fn cancellable_sleep(&self, duration: std::time::Duration) {
        const TICK: std::time::Duration = std::time::Duration::from_millis(100);
        let mut remaining = duration;
        while remaining > std::time::Duration::ZERO {
            if self.is_shutdown_requested() {
                return;
            }
            let step = remaining.min(TICK);
            std::thread::sleep(step);
            remaining -= step;
        }
    }
}
