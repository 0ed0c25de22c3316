//! Public façade (C10, spec.md §4.10, §6 "Public API surface"). Creates
//! sessions bound to a fresh [`Beacon`](crate::model::Beacon), registers
//! them with the sender (C9), and hands back capability handles that are
//! real or no-op depending on the current capture state.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::cache::evictor::Evictor;
use crate::cache::BeaconCache;
use crate::config::{AgentConfig, DataCollectionLevel};
use crate::model::ids::IdProvider;
use crate::model::noop::NoopSession;
use crate::model::session::{RealSession, SessionEntry, SessionLifecycle};
use crate::model::{Beacon, SessionHandle};
use crate::sending::http::HttpCollaborator;
use crate::sending::{SenderTask, SendingContext};

/// Entry point: one `OpenKit` per application process, per spec.md §3
/// ("parent OpenKit" on every Session).
pub struct OpenKit {
    config: AgentConfig,
    cache: Arc<BeaconCache>,
    session_ids: IdProvider,
    action_ids: Arc<IdProvider>,
    sender: Arc<SenderTask>,
    evictor: Arc<Evictor>,
}

/// `create_openkit(config) -> OpenKit` (spec.md §6). The HTTP collaborator
/// is the external transport seam (§6 "Deliberately OUT of scope"); the
/// host supplies a concrete implementation.
pub fn create_openkit(config: AgentConfig, http: Arc<dyn HttpCollaborator>) -> Arc<OpenKit> {
    let cache = Arc::new(BeaconCache::new());
    let limits = config.cache_limits;
    let evictor = Evictor::new(cache.clone(), limits.max_record_age_ms, limits.cache_lower_bytes, limits.cache_upper_bytes);
    evictor.start();

    let ctx = Arc::new(SendingContext::new(config.clone(), cache.clone(), http));
    let sender = SenderTask::new(ctx);
    sender.start();

    info!(application_id = %config.application_id, "openkit initialized");

    Arc::new(OpenKit {
        config,
        cache,
        session_ids: IdProvider::new(),
        action_ids: Arc::new(IdProvider::new()),
        sender,
        evictor,
    })
}

impl OpenKit {
    /// Blocks until init completes or `timeout` elapses; `None` blocks
    /// indefinitely. Returns whether init completed.
    pub fn wait_for_init(&self, timeout: Option<Duration>) -> bool {
        const POLL: Duration = Duration::from_millis(20);
        let deadline = timeout.map(|d| Instant::now() + d);
        loop {
            if self.is_initialized() {
                return true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return false;
                }
            }
            std::thread::sleep(POLL);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.sender.context().is_init_completed()
    }

    /// `openkit.create_session(client_ip?) -> Session` (spec.md §6). When
    /// capture is off (server-directed or via `data_collection_level =
    /// Off`) a [`NoopSession`] is returned instead (spec.md §4.10).
    pub fn create_session(&self, client_ip: Option<&str>) -> Box<dyn SessionHandle> {
        if self.config.data_collection_level == DataCollectionLevel::Off {
            return Box::new(NoopSession);
        }
        if self.is_initialized() && !self.sender.context().attributes().capture {
            return Box::new(NoopSession);
        }

        let session_id = self.session_ids.next_id();
        let now = now_ms();
        let beacon = Arc::new(Beacon::new(session_id, self.cache.clone(), self.config.clone(), self.action_ids.clone(), now));
        let entry = Arc::new(SessionEntry {
            session_id,
            beacon,
            lifecycle: parking_lot::Mutex::new(SessionLifecycle::New),
            client_ip: client_ip.map(str::to_string),
        });
        self.sender.context().register_session(entry.clone());
        Box::new(RealSession::new(entry, now))
    }

    /// Stops the sender (flushing finished+configured sessions best-effort)
    /// and the evictor.
    pub fn shutdown(&self) {
        self.sender.stop();
        self.evictor.stop();
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheLimits, CrashReportingLevel, TrustMode};
    use crate::error::AgentError;
    use crate::sending::http::{HttpResponse, StatusRequestParams};

    fn test_config(level: DataCollectionLevel) -> AgentConfig {
        AgentConfig {
            endpoint_url: "https://example.com".to_string(),
            application_id: "app".to_string(),
            device_id: 1,
            agent_version: "1.0".to_string(),
            os_name: "test".to_string(),
            manufacturer: "test".to_string(),
            model_id: "test".to_string(),
            trust_mode: TrustMode::Strict,
            cache_limits: CacheLimits::default(),
            data_collection_level: level,
            crash_reporting_level: CrashReportingLevel::OptOutCrashes,
            platform_type: 1,
        }
    }

    struct CaptureOnHttp;
    impl HttpCollaborator for CaptureOnHttp {
        fn send_status_request(&self, _config: &AgentConfig, _params: &StatusRequestParams) -> Result<HttpResponse, AgentError> {
            Ok(HttpResponse {
                status_code: 200,
                body: "type=m&cp=1".to_string(),
                retry_after_seconds: None,
            })
        }
        fn send_new_session_request(&self, _config: &AgentConfig, _session_id: i64) -> Result<HttpResponse, AgentError> {
            Ok(HttpResponse {
                status_code: 200,
                body: "type=m".to_string(),
                retry_after_seconds: None,
            })
        }
        fn send_beacon(&self, _config: &AgentConfig, _session_id: i64, _body: &str) -> Result<HttpResponse, AgentError> {
            Ok(HttpResponse {
                status_code: 200,
                body: String::new(),
                retry_after_seconds: None,
            })
        }
    }

    #[test]
    fn data_collection_off_always_returns_noop_session() {
        let openkit = create_openkit(test_config(DataCollectionLevel::Off), Arc::new(CaptureOnHttp));
        let session = openkit.create_session(None);
        session.enter_action("a"); // no panic, pure no-op
        openkit.shutdown();
    }

    #[test]
    fn wait_for_init_completes_once_status_request_succeeds() {
        let openkit = create_openkit(test_config(DataCollectionLevel::Performance), Arc::new(CaptureOnHttp));
        assert!(openkit.wait_for_init(Some(Duration::from_secs(2))));
        assert!(openkit.is_initialized());
        openkit.shutdown();
    }
}
