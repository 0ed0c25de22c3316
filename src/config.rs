//! Host-supplied agent configuration (spec.md §6 "Configuration").
//!
//! TOML is the host's config source, mirroring the two-layer `RawConfig` /
//! public-config pattern used elsewhere in this crate's lineage: a `serde`
//! struct with every field optional, validated and defaulted into a strict
//! public struct.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustMode {
    Strict,
    Blind,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataCollectionLevel {
    Off,
    Performance,
    UserBehavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashReportingLevel {
    Off,
    OptOutCrashes,
    OptInCrashes,
}

/// Beacon cache bounds; `-1` (or absence) on any raw field means "use the
/// default" per spec.md §6.
#[derive(Debug, Clone, Copy)]
pub struct CacheLimits {
    pub max_record_age_ms: i64,
    pub cache_lower_bytes: i64,
    pub cache_upper_bytes: i64,
}

impl Default for CacheLimits {
    fn default() -> Self {
        CacheLimits {
            max_record_age_ms: 2 * 60 * 60 * 1000,
            cache_lower_bytes: 100 * 1024,
            cache_upper_bytes: 150 * 1024,
        }
    }
}

/// Fully resolved, ready-to-use agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub endpoint_url: String,
    pub application_id: String,
    pub device_id: i64,
    pub agent_version: String,
    pub os_name: String,
    pub manufacturer: String,
    pub model_id: String,
    pub trust_mode: TrustMode,
    pub cache_limits: CacheLimits,
    pub data_collection_level: DataCollectionLevel,
    pub crash_reporting_level: CrashReportingLevel,
    /// Sent as the status endpoint's `pt` query parameter (spec.md §6, §11).
    pub platform_type: i32,
}

// ---------------------------------------------------------------------------
// Raw TOML deserialization types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct RawConfig {
    endpoint_url: Option<String>,
    application_id: Option<String>,
    device_id: Option<RawDeviceId>,
    agent_version: Option<String>,
    os_name: Option<String>,
    manufacturer: Option<String>,
    model_id: Option<String>,
    trust_mode: Option<String>,
    cache: Option<RawCacheLimits>,
    data_collection_level: Option<String>,
    crash_reporting_level: Option<String>,
    platform_type: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDeviceId {
    Int(i64),
    Text(String),
}

#[derive(Debug, Deserialize, Default)]
struct RawCacheLimits {
    max_record_age_ms: Option<i64>,
    cache_lower_bytes: Option<i64>,
    cache_upper_bytes: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("parsing config TOML: {0}")]
    Parse(String),
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Builds a device id's numeric form the way the host does: an int64 is
/// used verbatim, a string is hashed (FNV-1a) to an int64, matching the
/// "device id (int64 or string hashed to int64)" contract of spec.md §6.
fn hash_device_id(s: &str) -> i64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash as i64
}

pub fn load_config_from_str(toml_str: &str) -> Result<AgentConfig, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    resolve(raw)
}

fn resolve(raw: RawConfig) -> Result<AgentConfig, ConfigError> {
    let endpoint_url = raw
        .endpoint_url
        .ok_or_else(|| ConfigError::MissingField("endpoint_url".to_owned()))?;
    let application_id = raw
        .application_id
        .ok_or_else(|| ConfigError::MissingField("application_id".to_owned()))?;

    let device_id = match raw.device_id {
        Some(RawDeviceId::Int(i)) => i,
        Some(RawDeviceId::Text(s)) => hash_device_id(&s),
        None => 0,
    };

    let trust_mode = match raw.trust_mode.as_deref() {
        Some("Strict") | None => TrustMode::Strict,
        Some("Blind") => TrustMode::Blind,
        Some("Custom") => TrustMode::Custom,
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                field: "trust_mode".to_owned(),
                reason: format!("unknown trust mode '{other}'"),
            })
        }
    };

    let data_collection_level = match raw.data_collection_level.as_deref() {
        Some("Off") => DataCollectionLevel::Off,
        Some("Performance") | None => DataCollectionLevel::Performance,
        Some("UserBehavior") => DataCollectionLevel::UserBehavior,
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                field: "data_collection_level".to_owned(),
                reason: format!("unknown level '{other}'"),
            })
        }
    };

    let crash_reporting_level = match raw.crash_reporting_level.as_deref() {
        Some("Off") => CrashReportingLevel::Off,
        Some("OptOutCrashes") | None => CrashReportingLevel::OptOutCrashes,
        Some("OptInCrashes") => CrashReportingLevel::OptInCrashes,
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                field: "crash_reporting_level".to_owned(),
                reason: format!("unknown level '{other}'"),
            })
        }
    };

    let defaults = CacheLimits::default();
    let cache_limits = match raw.cache {
        Some(c) => CacheLimits {
            max_record_age_ms: resolve_bound(c.max_record_age_ms, defaults.max_record_age_ms),
            cache_lower_bytes: resolve_bound(c.cache_lower_bytes, defaults.cache_lower_bytes),
            cache_upper_bytes: resolve_bound(c.cache_upper_bytes, defaults.cache_upper_bytes),
        },
        None => defaults,
    };

    Ok(AgentConfig {
        endpoint_url,
        application_id,
        device_id,
        agent_version: raw.agent_version.unwrap_or_else(|| "1.0".to_owned()),
        os_name: raw.os_name.unwrap_or_else(|| "unknown".to_owned()),
        manufacturer: raw.manufacturer.unwrap_or_else(|| "unknown".to_owned()),
        model_id: raw.model_id.unwrap_or_else(|| "unknown".to_owned()),
        trust_mode,
        cache_limits,
        data_collection_level,
        crash_reporting_level,
        platform_type: raw.platform_type.unwrap_or(1),
    })
}

fn resolve_bound(raw: Option<i64>, default: i64) -> i64 {
    match raw {
        Some(v) if v == -1 => default,
        Some(v) => v,
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let cfg = load_config_from_str(
            r#"
            endpoint_url = "https://example.com/mbeacon"
            application_id = "app-123"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.trust_mode, TrustMode::Strict);
        assert_eq!(cfg.cache_limits.cache_lower_bytes, 100 * 1024);
    }

    #[test]
    fn negative_one_cache_bound_uses_default() {
        let cfg = load_config_from_str(
            r#"
            endpoint_url = "https://example.com/mbeacon"
            application_id = "app-123"

            [cache]
            cache_lower_bytes = -1
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cache_limits.cache_lower_bytes, 100 * 1024);
    }

    #[test]
    fn missing_endpoint_fails() {
        let err = load_config_from_str(r#"application_id = "app-123""#);
        assert!(err.is_err());
    }

    #[test]
    fn string_device_id_hashes_deterministically() {
        let cfg = load_config_from_str(
            r#"
            endpoint_url = "https://example.com/mbeacon"
            application_id = "app-123"
            device_id = "phone-42"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.device_id, hash_device_id("phone-42"));
    }
}
