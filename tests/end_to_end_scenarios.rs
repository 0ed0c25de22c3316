//! End-to-end scenarios from spec.md §8 ("Concrete end-to-end scenarios")
//! that need the full sending pipeline rather than a single component.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rum_agent::cache::BeaconCache;
use rum_agent::config::{AgentConfig, CacheLimits, CrashReportingLevel, DataCollectionLevel, TrustMode};
use rum_agent::error::AgentError;
use rum_agent::openkit::create_openkit;
use rum_agent::sending::http::{HttpCollaborator, HttpResponse, StatusRequestParams};
use rum_agent::sending::{SendingContext, State};

fn test_config() -> AgentConfig {
    AgentConfig {
        endpoint_url: "https://example.com/mbeacon".to_string(),
        application_id: "app-under-test".to_string(),
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

/// A status endpoint that throttles exactly once, then reports capture=on,
/// recording the `Retry-After` it handed back and when it was asked again.
struct ThrottleOnceHttp {
    status_calls: AtomicU32,
    retry_after_secs: u64,
    first_call_at: Mutex<Option<std::time::Instant>>,
    second_call_at: Mutex<Option<std::time::Instant>>,
}

impl HttpCollaborator for ThrottleOnceHttp {
    fn send_status_request(&self, _config: &AgentConfig, _params: &StatusRequestParams) -> Result<HttpResponse, AgentError> {
        let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            *self.first_call_at.lock().unwrap() = Some(std::time::Instant::now());
            Ok(HttpResponse {
                status_code: 429,
                body: String::new(),
                retry_after_seconds: Some(self.retry_after_secs),
            })
        } else {
            *self.second_call_at.lock().unwrap() = Some(std::time::Instant::now());
            Ok(HttpResponse {
                status_code: 200,
                body: "type=m&cp=1".to_string(),
                retry_after_seconds: None,
            })
        }
    }

    fn send_new_session_request(&self, _config: &AgentConfig, _session_id: i64) -> Result<HttpResponse, AgentError> {
        Ok(HttpResponse {
            status_code: 200,
            body: String::new(),
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

/// Scenario 5: a 429 with `Retry-After: 1` (scaled down from the spec's
/// 1234s so the test finishes quickly) makes `Initial` sleep at least that
/// long before re-trying the status request.
#[test]
fn scenario_5_throttled_status_sleeps_for_retry_after_before_retrying() {
    let cache = Arc::new(BeaconCache::new());
    let http = Arc::new(ThrottleOnceHttp {
        status_calls: AtomicU32::new(0),
        retry_after_secs: 1,
        first_call_at: Mutex::new(None),
        second_call_at: Mutex::new(None),
    });
    let ctx = SendingContext::new(test_config(), cache, http.clone());

    let next = State::Initial.execute(&ctx);
    assert!(matches!(next, State::CaptureOn { .. }));

    let first = http.first_call_at.lock().unwrap().unwrap();
    let second = http.second_call_at.lock().unwrap().unwrap();
    assert!(second.duration_since(first) >= Duration::from_secs(1));
    assert_eq!(http.status_calls.load(Ordering::SeqCst), 2);
}

/// Scenario 6: merging `{"appConfig":{"capture":0}}` onto defaults flips
/// `capture` and leaves every other field at its default.
#[test]
fn scenario_6_response_merge_only_touches_set_fields() {
    use rum_agent::response::{parse, ResponseAttributes};

    let defaults = ResponseAttributes::default();
    let delta = parse(r#"{"appConfig":{"capture":0}}"#).expect("valid json");
    let merged = defaults.merge(&delta);

    assert!(!merged.capture);
    assert_eq!(merged.send_interval_ms, defaults.send_interval_ms);
    assert_eq!(merged.max_beacon_size_bytes, defaults.max_beacon_size_bytes);
    assert_eq!(merged.session_timeout_ms, defaults.session_timeout_ms);
}

/// A full façade round-trip: creating a session, reporting through it, and
/// ending it transitions the session to `FinishedAndConfigured` once the
/// sender's new-session request for it succeeds.
struct AlwaysOkHttp;
impl HttpCollaborator for AlwaysOkHttp {
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
            body: String::new(),
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
fn facade_session_lifecycle_reaches_the_sender() {
    let openkit = create_openkit(test_config(), Arc::new(AlwaysOkHttp));
    assert!(openkit.wait_for_init(Some(Duration::from_secs(2))));

    let session = openkit.create_session(Some("203.0.113.5"));
    let action = session.enter_action("checkout");
    action.report_event("added-item");
    action.leave_action();
    session.end();

    std::thread::sleep(Duration::from_millis(200));
    openkit.shutdown();
}
