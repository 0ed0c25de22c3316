//! Background sender task (C9, spec.md §4.9): owns the shared
//! [`SendingContext`] and drives the state machine (C8) on a dedicated OS
//! thread until it reaches `Terminal`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::info;

use crate::sending::context::SendingContext;
use crate::sending::state::State;

pub struct SenderTask {
    ctx: Arc<SendingContext>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SenderTask {
    pub fn new(ctx: Arc<SendingContext>) -> Arc<Self> {
        Arc::new(SenderTask {
            ctx,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        })
    }

    pub fn context(&self) -> &Arc<SendingContext> {
        &self.ctx
    }

    /// Starts the sender thread. No-op, returns `false`, if already running.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.running.swap(true, Ordering::SeqCst) {
            return false;
        }
        let ctx = self.ctx.clone();
        let running = self.running.clone();
        let join = std::thread::Builder::new()
            .name("beacon-sender".to_string())
            .spawn(move || {
                info!("sender task starting");
                let mut state = State::Initial;
                while !state.is_terminal() {
                    state = state.execute(&ctx);
                }
                running.store(false, Ordering::SeqCst);
                info!("sender task stopped");
            })
            .expect("failed to spawn sender thread");
        *self.handle.lock() = Some(join);
        true
    }

    /// Requests a graceful shutdown and waits for the thread to exit.
    /// No-op, returns `false`, if not running.
    pub fn stop(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        self.ctx.request_shutdown();
        if let Some(join) = self.handle.lock().take() {
            let _ = join.join();
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BeaconCache;
    use crate::config::{AgentConfig, CacheLimits, CrashReportingLevel, DataCollectionLevel, TrustMode};
    use crate::error::AgentError;
    use crate::sending::http::{HttpCollaborator, HttpResponse, StatusRequestParams};

    fn test_config() -> AgentConfig {
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
            data_collection_level: DataCollectionLevel::Performance,
            crash_reporting_level: CrashReportingLevel::OptOutCrashes,
            platform_type: 1,
        }
    }

    struct CaptureOffHttp;
    impl HttpCollaborator for CaptureOffHttp {
        fn send_status_request(&self, _config: &AgentConfig, _params: &StatusRequestParams) -> Result<HttpResponse, AgentError> {
            Ok(HttpResponse {
                status_code: 200,
                body: "type=m&cp=0".to_string(),
                retry_after_seconds: None,
            })
        }
        fn send_new_session_request(&self, _config: &AgentConfig, _session_id: i64) -> Result<HttpResponse, AgentError> {
            unreachable!()
        }
        fn send_beacon(&self, _config: &AgentConfig, _session_id: i64, _body: &str) -> Result<HttpResponse, AgentError> {
            unreachable!()
        }
    }

    #[test]
    fn start_stop_cycles_thread_cleanly() {
        let cache = Arc::new(BeaconCache::new());
        let http = Arc::new(CaptureOffHttp);
        let ctx = Arc::new(SendingContext::new(test_config(), cache, http));
        let task = SenderTask::new(ctx);
        assert!(task.start());
        assert!(!task.start());
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(task.stop());
        assert!(!task.is_running());
    }
}
