//! HTTP collaborator contract (spec.md §6 "External Interfaces"). The
//! concrete HTTP/TLS client is deliberately out of scope (spec.md §1); a
//! host embeds this crate and supplies an implementation of
//! [`HttpCollaborator`] wired to its own transport.

use crate::config::AgentConfig;
use crate::error::AgentError;

/// One HTTP response from the collector, already read to completion.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
    /// Parsed `Retry-After` header, in seconds, when present (spec.md §6).
    pub retry_after_seconds: Option<u64>,
}

impl HttpResponse {
    /// `< 400` per spec.md §6 "Status codes".
    pub fn is_success(&self) -> bool {
        self.status_code < 400
    }

    pub fn is_throttled(&self) -> bool {
        self.status_code == 429
    }
}

/// Fixed status-endpoint query parameters (spec.md §6, §11): `srvid`, `app`,
/// `va`, `pt` assembled by the sending state machine from the config and the
/// last known server id. Implementations append the literal `tt=okc`
/// themselves.
#[derive(Debug, Clone)]
pub struct StatusRequestParams {
    pub server_id: i64,
    pub application_id: String,
    pub agent_version: String,
    pub platform_type: i32,
}

/// The external collaborator seam for the status endpoint, new-session
/// requests, and beacon uploads. Implementations are responsible for
/// gzip/deflate compression, the `Accept-Encoding` header, and connect+read
/// timeouts (default 30s, spec.md §5).
pub trait HttpCollaborator: Send + Sync {
    /// `GET …/mbeacon/<appId>?type=m&srvid=…&app=…&va=…&pt=…&tt=okc` (spec.md
    /// §6, §11).
    fn send_status_request(&self, config: &AgentConfig, params: &StatusRequestParams) -> Result<HttpResponse, AgentError>;

    /// A status-shaped request issued once per new session, to obtain its
    /// server-assigned id (spec.md §4.8 CaptureOn step 1).
    fn send_new_session_request(&self, config: &AgentConfig, session_id: i64) -> Result<HttpResponse, AgentError>;

    /// `POST …/mbeacon/<appId>?…` with the chunk body (spec.md §6).
    fn send_beacon(&self, config: &AgentConfig, session_id: i64, body: &str) -> Result<HttpResponse, AgentError>;
}
