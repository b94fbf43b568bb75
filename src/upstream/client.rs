//! Volumes API client with breaker gating and retries.
//!
//! # Responsibilities
//! - Build authenticated and anonymous request URLs
//! - Classify every response (see `error.rs`)
//! - Retry transient failures with exponential backoff
//! - Report each attempt to the monitor and the definitive outcome to the breaker
//!
//! # Data Flow
//! ```text
//! get_volume / search_volumes
//!     → breaker.is_call_allowed()       (fail fast with CircuitOpen)
//!     → run_with_retry(attempt)          (monitor hook per attempt)
//!     → breaker.record_success/failure   (once per logical call)
//! ```
//!
//! # Design Decisions
//! - Only authenticated calls pass through the breaker; the anonymous search
//!   path exists precisely for when the keyed quota is gone
//! - 404 is a healthy answer ("no such volume") and maps to `Ok(None)`
//! - Search attempts run once: the provider chain is their fallback and each
//!   attempt already has a hard deadline

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::config::UpstreamConfig;
use crate::model::{Record, TierKind};
use crate::observability::SharedMonitor;
use crate::resilience::{run_with_retry, BackoffPolicy, CircuitBreaker, CircuitState};
use crate::upstream::error::UpstreamError;
use crate::upstream::types::{record_from_volume, records_from_envelope, VolumesEnvelope};

/// Hard ceiling the volumes API puts on `maxResults`.
pub const MAX_RESULTS_PER_PAGE: u32 = 40;

/// Whether to attach the API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Keyed,
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Relevance,
    Newest,
}

impl OrderBy {
    fn as_str(self) -> &'static str {
        match self {
            OrderBy::Relevance => "relevance",
            OrderBy::Newest => "newest",
        }
    }
}

/// Parameters of one `/volumes?q=` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeQuery {
    pub q: String,
    pub start_index: u32,
    pub max_results: u32,
    pub order_by: OrderBy,
    pub lang_restrict: Option<String>,
}

impl VolumeQuery {
    pub fn new(q: impl Into<String>, max_results: u32) -> Self {
        Self {
            q: q.into(),
            start_index: 0,
            max_results: max_results.clamp(1, MAX_RESULTS_PER_PAGE),
            order_by: OrderBy::Relevance,
            lang_restrict: None,
        }
    }

    pub fn language(mut self, lang: Option<&str>) -> Self {
        self.lang_restrict = lang.map(str::to_string);
        self
    }
}

#[derive(Debug)]
pub struct VolumesClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    breaker: Arc<CircuitBreaker>,
    retry: BackoffPolicy,
    monitor: SharedMonitor,
}

impl VolumesClient {
    pub fn new(
        config: &UpstreamConfig,
        breaker: Arc<CircuitBreaker>,
        retry: BackoffPolicy,
        monitor: SharedMonitor,
    ) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| UpstreamError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(UpstreamError::InvalidUrl(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(concat!("book-resolver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(UpstreamError::from_reqwest)?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key().map(str::to_string),
            breaker,
            retry,
            monitor,
        })
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch one volume by id. `Ok(None)` means the upstream does not know it.
    pub async fn get_volume(&self, id: &str) -> Result<Option<Record>, UpstreamError> {
        let url = self.endpoint_url(&["volumes", id], Auth::Keyed)?;
        let body = self.call("volumes.get", url, true, &self.retry).await?;
        body.map(|value| record_from_volume(value, TierKind::Upstream))
            .transpose()
    }

    /// Fetch one page of search results.
    pub async fn search_volumes(
        &self,
        query: &VolumeQuery,
        auth: Auth,
    ) -> Result<Vec<Record>, UpstreamError> {
        let mut url = self.endpoint_url(&["volumes"], auth)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", &query.q)
                .append_pair("startIndex", &query.start_index.to_string())
                .append_pair(
                    "maxResults",
                    &query.max_results.clamp(1, MAX_RESULTS_PER_PAGE).to_string(),
                )
                .append_pair("orderBy", query.order_by.as_str());
            if let Some(lang) = &query.lang_restrict {
                pairs.append_pair("langRestrict", lang);
            }
        }

        let endpoint = match auth {
            Auth::Keyed => "volumes.search",
            Auth::Anonymous => "volumes.search_anonymous",
        };
        let body = self
            .call(endpoint, url, auth == Auth::Keyed, &BackoffPolicy::immediate(1))
            .await?;

        let Some(body) = body else {
            return Ok(Vec::new());
        };
        let envelope: VolumesEnvelope =
            serde_json::from_value(body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        Ok(records_from_envelope(envelope))
    }

    fn endpoint_url(&self, segments: &[&str], auth: Auth) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if let (Auth::Keyed, Some(key)) = (auth, &self.api_key) {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn call(
        &self,
        endpoint: &'static str,
        url: Url,
        gated: bool,
        policy: &BackoffPolicy,
    ) -> Result<Option<Value>, UpstreamError> {
        if gated && !self.breaker.is_call_allowed() {
            self.monitor
                .record_failure(endpoint, UpstreamError::CircuitOpen.reason());
            return Err(UpstreamError::CircuitOpen);
        }

        let breaker = &self.breaker;
        let result = run_with_retry(
            policy,
            endpoint,
            |_| self.attempt(endpoint, url.clone()),
            || !gated || breaker.state() != CircuitState::Open,
        )
        .await;

        match result {
            Ok(outcome) => {
                if gated {
                    breaker.record_success();
                }
                Ok(outcome.value)
            }
            Err(terminal) => {
                if gated {
                    if let Some(kind) = terminal.error.failure_kind() {
                        breaker.record_failure(kind);
                    }
                }
                if terminal.exhausted_retryable {
                    self.monitor.record_failure(endpoint, "retries_exhausted");
                }
                Err(terminal.error)
            }
        }
    }

    async fn attempt(&self, endpoint: &'static str, url: Url) -> Result<Option<Value>, UpstreamError> {
        let outcome = self.send(url).await;
        match &outcome {
            Ok(_) => self.monitor.record_success(endpoint),
            Err(e) => self.monitor.record_failure(endpoint, e.reason()),
        }
        outcome
    }

    async fn send(&self, url: Url) -> Result<Option<Value>, UpstreamError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::from_reqwest)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(UpstreamError::from_status(status));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(UpstreamError::from_reqwest)?;
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::default_monitor;
    use crate::observability::monitor::testing::RecordingMonitor;
    use crate::resilience::BreakerSettings;

    fn client(api_key: &str) -> VolumesClient {
        let config = UpstreamConfig {
            base_url: "https://books.example/books/v1/".to_string(),
            api_key: api_key.to_string(),
            ..UpstreamConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::new("volumes", BreakerSettings::default()));
        VolumesClient::new(&config, breaker, BackoffPolicy::immediate(1), default_monitor()).unwrap()
    }

    #[test]
    fn test_volume_url_keeps_base_path() {
        let url = client("").endpoint_url(&["volumes", "abc"], Auth::Keyed).unwrap();
        assert_eq!(url.as_str(), "https://books.example/books/v1/volumes/abc");
    }

    #[test]
    fn test_key_only_on_keyed_requests() {
        let c = client("secret");
        assert!(c.has_api_key());
        let keyed = c.endpoint_url(&["volumes"], Auth::Keyed).unwrap();
        assert_eq!(keyed.query(), Some("key=secret"));
        let anonymous = c.endpoint_url(&["volumes"], Auth::Anonymous).unwrap();
        assert_eq!(anonymous.query(), None);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = UpstreamConfig {
            base_url: "not a url".to_string(),
            ..UpstreamConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::new("volumes", BreakerSettings::default()));
        let err = VolumesClient::new(&config, breaker, BackoffPolicy::default(), default_monitor())
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidUrl(_)));
    }

    #[test]
    fn test_query_clamps_page_size() {
        assert_eq!(VolumeQuery::new("dune", 500).max_results, MAX_RESULTS_PER_PAGE);
        assert_eq!(VolumeQuery::new("dune", 0).max_results, 1);
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast() {
        let config = UpstreamConfig {
            base_url: "https://books.example/books/v1".to_string(),
            api_key: "secret".to_string(),
            ..UpstreamConfig::default()
        };
        let breaker = Arc::new(CircuitBreaker::new("volumes", BreakerSettings::default()));
        let monitor = Arc::new(RecordingMonitor::default());
        let c = VolumesClient::new(&config, breaker, BackoffPolicy::immediate(1), monitor.clone()).unwrap();

        for _ in 0..3 {
            c.breaker()
                .record_failure(crate::resilience::FailureKind::RateLimited);
        }
        assert_eq!(c.breaker().state(), CircuitState::Open);
        let err = c.get_volume("abc").await.unwrap_err();
        assert_eq!(err, UpstreamError::CircuitOpen);

        assert_eq!(monitor.failures(), 1);
        assert_eq!(monitor.successes(), 0);
        let events = monitor.events.lock().unwrap();
        assert_eq!(events[0].1.as_deref(), Some("circuit_open"));
    }
}
