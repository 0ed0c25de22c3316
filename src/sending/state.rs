//! Sending state machine (C8, spec.md §4.8):
//!
//! ```text
//! Initial ──success──► CaptureOn  ◄──► CaptureOff
//!    │                   │              │
//!    └──shutdown─────────┴──shutdown────┴──► FlushSessions ──► Terminal
//! ```

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::model::session::SessionLifecycle;
use crate::response;
use crate::sending::context::SendingContext;

/// Initial per-attempt sleep `S` (spec.md §4.8).
const INITIAL_SLEEP_MS: u64 = 1_000;
const MAX_BACKOFF_ATTEMPTS: u32 = 5;
/// `[1m, 5m, 15m, 1h, 2h]`, clamped to the last entry beyond its length.
const REINIT_DELAYS_MS: [u64; 5] = [60_000, 300_000, 900_000, 3_600_000, 7_200_000];
const DEFAULT_THROTTLE_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub enum State {
    Initial,
    CaptureOn { last_open_send_ms: i64 },
    CaptureOff,
    FlushSessions,
    Terminal,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Terminal)
    }

    pub fn execute(self, ctx: &SendingContext) -> State {
        match self {
            State::Initial => execute_initial(ctx),
            State::CaptureOn { last_open_send_ms } => execute_capture_on(ctx, last_open_send_ms),
            State::CaptureOff => execute_capture_off(ctx),
            State::FlushSessions => execute_flush_sessions(ctx),
            State::Terminal => State::Terminal,
        }
    }
}

fn execute_initial(ctx: &SendingContext) -> State {
    let mut attempt: u32 = 0;
    loop {
        if ctx.is_shutdown_requested() {
            ctx.set_init_completed(false);
            return State::Terminal;
        }

        match ctx.http.send_status_request(&ctx.config, &ctx.status_request_params()) {
            Ok(resp) if resp.is_throttled() => {
                let retry_secs = resp.retry_after_seconds.unwrap_or(DEFAULT_THROTTLE_SECS);
                ctx.cancellable_sleep(Duration::from_secs(retry_secs));
                if ctx.is_shutdown_requested() {
                    ctx.set_init_completed(false);
                    return State::Terminal;
                }
                continue;
            }
            Ok(resp) if resp.is_success() => match response::parse(&resp.body) {
                Ok(attrs) => {
                    let capture_on = attrs.capture;
                    ctx.merge_attributes(&attrs);
                    ctx.set_init_completed(true);
                    return if capture_on {
                        State::CaptureOn { last_open_send_ms: 0 }
                    } else {
                        State::CaptureOff
                    };
                }
                Err(e) => {
                    warn!(error = %e, "failed to parse status response, retrying");
                }
            },
            Ok(_) | Err(_) => {
                debug!(attempt, "status request failed");
            }
        }

        attempt += 1;
        let sleep_ms = if attempt <= MAX_BACKOFF_ATTEMPTS {
            INITIAL_SLEEP_MS * (1u64 << (attempt - 1))
        } else {
            let idx = ((attempt - MAX_BACKOFF_ATTEMPTS - 1) as usize).min(REINIT_DELAYS_MS.len() - 1);
            REINIT_DELAYS_MS[idx]
        };
        ctx.cancellable_sleep(Duration::from_millis(sleep_ms));
    }
}

fn execute_capture_on(ctx: &SendingContext, last_open_send_ms: i64) -> State {
    if ctx.is_shutdown_requested() {
        return State::FlushSessions;
    }

    let sessions = ctx.session_snapshot();

    // Step 1: new sessions' opening beacons.
    for entry in &sessions {
        if *entry.lifecycle.lock() == SessionLifecycle::New {
            match ctx.http.send_new_session_request(&ctx.config, entry.session_id) {
                Ok(resp) if resp.is_success() => entry.mark_configured(),
                _ => debug!(session_id = entry.session_id, "new-session request failed"),
            }
        }
    }

    // Step 2: finished+configured sessions drain then evict.
    for entry in &sessions {
        if *entry.lifecycle.lock() == SessionLifecycle::FinishedAndConfigured {
            drain_session(ctx, entry.session_id);
            ctx.cache.delete_entry(entry.session_id);
            ctx.remove_session(entry.session_id);
        }
    }

    // Step 3: periodic flush of open+configured sessions.
    let now = now_ms();
    let send_interval_ms = ctx.attributes().send_interval_ms;
    let mut next_last_send = last_open_send_ms;
    if now - last_open_send_ms >= send_interval_ms {
        for entry in &sessions {
            if *entry.lifecycle.lock() == SessionLifecycle::Configured {
                drain_session(ctx, entry.session_id);
            }
        }
        next_last_send = now;
    }

    // Step 4: react to the most recent status the drains/sends observed.
    match ctx.http.send_status_request(&ctx.config, &ctx.status_request_params()) {
        Ok(resp) if resp.is_throttled() => {
            let retry_secs = resp.retry_after_seconds.unwrap_or(DEFAULT_THROTTLE_SECS);
            ctx.cancellable_sleep(Duration::from_secs(retry_secs));
            clear_captured_data(ctx);
            State::CaptureOff
        }
        Ok(resp) if resp.is_success() => match response::parse(&resp.body) {
            Ok(attrs) => {
                let capture_on = attrs.capture;
                ctx.merge_attributes(&attrs);
                if capture_on {
                    State::CaptureOn {
                        last_open_send_ms: next_last_send,
                    }
                } else {
                    clear_captured_data(ctx);
                    State::CaptureOff
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to parse status response, keeping previous attributes");
                State::CaptureOn {
                    last_open_send_ms: next_last_send,
                }
            }
        },
        Ok(_) | Err(_) => State::CaptureOn {
            last_open_send_ms: next_last_send,
        },
    }
}

fn execute_capture_off(ctx: &SendingContext) -> State {
    if ctx.is_shutdown_requested() {
        return State::FlushSessions;
    }

    // Finished sessions' captured data is discarded, not sent, while off.
    for entry in ctx.session_snapshot() {
        if *entry.lifecycle.lock() == SessionLifecycle::FinishedAndConfigured {
            ctx.cache.delete_entry(entry.session_id);
            ctx.remove_session(entry.session_id);
        }
    }

    match ctx.http.send_status_request(&ctx.config, &ctx.status_request_params()) {
        Ok(resp) if resp.is_success() => match response::parse(&resp.body) {
            Ok(attrs) => {
                let capture_on = attrs.capture;
                ctx.merge_attributes(&attrs);
                if capture_on {
                    State::CaptureOn { last_open_send_ms: 0 }
                } else {
                    State::CaptureOff
                }
            }
            Err(_) => State::CaptureOff,
        },
        _ => State::CaptureOff,
    }
}

fn execute_flush_sessions(ctx: &SendingContext) -> State {
    for entry in ctx.session_snapshot() {
        if matches!(
            *entry.lifecycle.lock(),
            SessionLifecycle::FinishedAndConfigured
        ) {
            drain_session(ctx, entry.session_id);
        }
    }
    info!("flushed sessions, sender task exiting");
    State::Terminal
}

fn drain_session(ctx: &SendingContext, session_id: i64) {
    let max_bytes = ctx.attributes().max_beacon_size_bytes.max(1) as usize;
    loop {
        let chunk = ctx.cache.get_next_chunk(session_id, "", max_bytes, "&");
        if chunk.is_empty() {
            break;
        }
        match ctx.http.send_beacon(&ctx.config, session_id, &chunk) {
            Ok(resp) if resp.is_success() => ctx.cache.remove_chunked_data(session_id),
            _ => {
                ctx.cache.reset_chunked_data(session_id);
                break;
            }
        }
    }
}

/// Drops all cached data and every session registration — used on a
/// CaptureOn -> CaptureOff transition (spec.md §4.8 step 4).
fn clear_captured_data(ctx: &SendingContext) {
    for entry in ctx.session_snapshot() {
        ctx.cache.delete_entry(entry.session_id);
        ctx.remove_session(entry.session_id);
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BeaconCache;
    use crate::config::{CacheLimits, CrashReportingLevel, DataCollectionLevel, TrustMode};
    use crate::error::AgentError;
    use crate::sending::http::{HttpCollaborator, HttpResponse};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

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

    struct AlwaysFailHttp {
        attempts: AtomicU32,
    }

    impl HttpCollaborator for AlwaysFailHttp {
        fn send_status_request(&self, _config: &crate::config::AgentConfig, _params: &StatusRequestParams) -> Result<HttpResponse, AgentError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::TransportFailure("connection refused".to_string()))
        }
        fn send_new_session_request(&self, _config: &crate::config::AgentConfig, _session_id: i64) -> Result<HttpResponse, AgentError> {
            unreachable!()
        }
        fn send_beacon(&self, _config: &crate::config::AgentConfig, _session_id: i64, _body: &str) -> Result<HttpResponse, AgentError> {
            unreachable!()
        }
    }

    struct ThrottledThenOkHttp;
    impl HttpCollaborator for ThrottledThenOkHttp {
        fn send_status_request(&self, _config: &crate::config::AgentConfig, _params: &StatusRequestParams) -> Result<HttpResponse, AgentError> {
            Ok(HttpResponse {
                status_code: 429,
                body: String::new(),
                retry_after_seconds: Some(1234),
            })
        }
        fn send_new_session_request(&self, _config: &crate::config::AgentConfig, _session_id: i64) -> Result<HttpResponse, AgentError> {
            unreachable!()
        }
        fn send_beacon(&self, _config: &crate::config::AgentConfig, _session_id: i64, _body: &str) -> Result<HttpResponse, AgentError> {
            unreachable!()
        }
    }

    #[test]
    fn reinit_delay_index_clamps_to_last_entry() {
        // attempt 11 => idx = (11-5-1)=5, clamped to len-1=4
        let idx = ((11u32 - MAX_BACKOFF_ATTEMPTS - 1) as usize).min(REINIT_DELAYS_MS.len() - 1);
        assert_eq!(idx, 4);
    }

    #[test]
    fn shutdown_mid_initial_returns_terminal_with_init_incomplete() {
        let cache = Arc::new(BeaconCache::new());
        let http = Arc::new(AlwaysFailHttp { attempts: AtomicU32::new(0) });
        let ctx = SendingContext::new(test_config(), cache, http);
        ctx.request_shutdown();
        let next = State::Initial.execute(&ctx);
        assert!(matches!(next, State::Terminal));
        assert!(!ctx.is_init_completed());
    }

    #[test]
    fn throttled_status_disables_capture_for_retry_after_duration() {
        let cache = Arc::new(BeaconCache::new());
        let http = Arc::new(ThrottledThenOkHttp);
        let ctx = SendingContext::new(test_config(), cache, http);
        ctx.request_shutdown();
        // shutdown set before the first retry loop iteration completes its sleep
        let next = State::Initial.execute(&ctx);
        assert!(matches!(next, State::Terminal));
    }
}
