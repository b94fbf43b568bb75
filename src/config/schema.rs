//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resolver.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the book resolver.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResolverConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Upstream volumes API settings.
    pub upstream: UpstreamConfig,

    /// Circuit breaker guarding the upstream.
    pub breaker: BreakerConfig,

    /// Retry configuration for upstream calls.
    pub retries: RetryConfig,

    /// Cache tier toggles and locations.
    pub tiers: TierConfig,

    /// Search coordinator settings.
    pub search: SearchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

impl ResolverConfig {
    /// Sections changed relative to `previous` that are only read at startup.
    pub fn restart_required_changes(&self, previous: &ResolverConfig) -> Vec<&'static str> {
        fn differs<T: Serialize>(a: &T, b: &T) -> bool {
            serde_json::to_value(a).ok() != serde_json::to_value(b).ok()
        }

        let mut changed = Vec::new();
        if differs(&self.listener, &previous.listener) {
            changed.push("listener");
        }
        if differs(&self.upstream, &previous.upstream) {
            changed.push("upstream");
        }
        if differs(&self.breaker, &previous.breaker) {
            changed.push("breaker");
        }
        if differs(&self.retries, &previous.retries) {
            changed.push("retries");
        }
        if differs(&self.tiers, &previous.tiers) {
            changed.push("tiers");
        }
        if self.search.secondary_enabled != previous.search.secondary_enabled
            || self.search.secondary_base_url != previous.search.secondary_base_url
        {
            changed.push("search.secondary");
        }
        if differs(&self.observability, &previous.observability) {
            changed.push("observability");
        }
        if self.admin.enabled != previous.admin.enabled
            || self.admin.bind_address != previous.admin.bind_address
        {
            changed.push("admin.bind_address");
        }
        changed
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for one API request in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Upstream volumes API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the volumes API (without trailing slash).
    pub base_url: String,

    /// API key sent as `key=`; empty means unauthenticated only.
    pub api_key: String,

    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            api_key: String::new(),
            request_timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl UpstreamConfig {
    /// API key if one is configured.
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

/// When an open breaker becomes eligible for a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPolicyKind {
    /// Probe after `probe_delay_secs` have elapsed since opening.
    Rolling,
    /// Trip on the first rate-limit signal and stay open until the next UTC midnight.
    DailyReset,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub policy: BreakerPolicyKind,

    /// Consecutive rate-limit failures that trip the breaker.
    pub rate_limit_threshold: u32,

    /// Consecutive failures of any kind that trip the breaker.
    pub failure_threshold: u32,

    /// Cooldown before a probe is allowed (rolling policy).
    pub probe_delay_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            policy: BreakerPolicyKind::Rolling,
            rate_limit_threshold: 3,
            failure_threshold: 6,
            probe_delay_secs: 60,
        }
    }
}

impl BreakerConfig {
    pub fn probe_delay(&self) -> Duration {
        Duration::from_secs(self.probe_delay_secs)
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
        }
    }
}

/// Which blob store backs the durable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DurableBackend {
    Filesystem,
    Memory,
}

/// Cache tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TierConfig {
    /// Enable the local JSON file cache.
    pub local_file_enabled: bool,

    /// Root of the local file cache (`books/`, `searches/`).
    pub cache_dir: PathBuf,

    /// Enable pre-recorded fixture data.
    pub fixture_enabled: bool,

    /// Root of the fixture data.
    pub fixture_dir: PathBuf,

    /// Enable the durable object-store cache.
    pub durable_enabled: bool,

    pub durable_backend: DurableBackend,

    /// Root directory for the filesystem blob store.
    pub durable_dir: PathBuf,

    /// Consult the durable store before the upstream. When false the durable
    /// store is only read after the upstream fails.
    pub always_check_durable_first: bool,

    /// Propagate upstream failures to the caller instead of returning "not found".
    pub fail_closed: bool,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            local_file_enabled: true,
            cache_dir: PathBuf::from("cache"),
            fixture_enabled: false,
            fixture_dir: PathBuf::from("fixtures"),
            durable_enabled: true,
            durable_backend: DurableBackend::Filesystem,
            durable_dir: PathBuf::from("store"),
            always_check_durable_first: true,
            fail_closed: false,
        }
    }
}

/// Search coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Allow external providers to fill a local shortfall.
    pub external_fallback_enabled: bool,

    /// Hard timeout for one provider attempt in milliseconds.
    pub provider_timeout_ms: u64,

    /// Enable the secondary (Open Library) provider.
    pub secondary_enabled: bool,

    /// Base URL of the secondary provider.
    pub secondary_base_url: String,

    /// Result count when the caller does not ask for one.
    pub default_limit: usize,

    /// Upper bound on requested result count.
    pub max_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            external_fallback_enabled: true,
            provider_timeout_ms: 3_000,
            secondary_enabled: true,
            secondary_base_url: "https://openlibrary.org".to_string(),
            default_limit: 20,
            max_limit: 40,
        }
    }
}

impl SearchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Text,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
