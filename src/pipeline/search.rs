//! Tiered search: local index first, external providers for the shortfall.
//!
//! # Data Flow
//! ```text
//! search(query, language, desired)
//!     → single-flight on (normalized query, language), sliced per caller
//!     → local index → hydrate ids via BookService (order preserved)
//!     → enough local results, or fallback disabled? return them
//!     → search chain: local_file → durable_store → external providers
//!         (cached augmentation must cover the shortfall to count as a hit)
//!     → merge: local first, de-duplicated, truncated to `desired`
//! ```
//!
//! # Design Decisions
//! - Local results are never displaced by external ones
//! - Any failure on the external side degrades to the local baseline
//! - Settings are swapped atomically on config reload

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use futures_util::future::join_all;
use thiserror::Error;

use crate::config::SearchConfig;
use crate::index::LocalIndex;
use crate::model::{normalize_query, CachedSearch, SearchHit, SearchKey, SearchResult, TierKind};
use crate::observability::metrics;
use crate::pipeline::books::BookService;
use crate::pipeline::single_flight::SingleFlight;
use crate::pipeline::tiered::TierChain;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,
}

pub struct TieredSearchCoordinator {
    index: Arc<dyn LocalIndex>,
    books: Arc<BookService>,
    augmentation: Arc<TierChain<SearchKey, CachedSearch>>,
    settings: Arc<ArcSwap<SearchConfig>>,
    flights: SingleFlight<String, (usize, SearchResult)>,
}

impl TieredSearchCoordinator {
    pub fn new(
        index: Arc<dyn LocalIndex>,
        books: Arc<BookService>,
        augmentation: TierChain<SearchKey, CachedSearch>,
        settings: Arc<ArcSwap<SearchConfig>>,
    ) -> Self {
        Self {
            index,
            books,
            augmentation: Arc::new(augmentation),
            settings,
            flights: SingleFlight::new("searches"),
        }
    }

    pub fn settings(&self) -> Arc<SearchConfig> {
        self.settings.load_full()
    }

    /// Swap in new settings; in-flight searches keep the ones they started with.
    pub fn update_settings(&self, settings: SearchConfig) {
        self.settings.store(Arc::new(settings));
        tracing::info!("Search settings updated");
    }

    /// Run a tiered search. `desired` defaults to and is capped by the settings.
    pub async fn search(
        self: &Arc<Self>,
        query: &str,
        language: Option<&str>,
        desired: Option<usize>,
    ) -> Result<SearchResult, SearchError> {
        let query = query.trim();
        if query.is_empty() || normalize_query(query).is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let (default_limit, max_limit) = {
            let settings = self.settings.load();
            (settings.default_limit, settings.max_limit)
        };
        let desired = desired.unwrap_or(default_limit).min(max_limit);
        let language = language
            .map(|l| l.trim().to_ascii_lowercase())
            .filter(|l| !l.is_empty());

        if desired == 0 {
            return Ok(SearchResult {
                query: query.to_string(),
                language,
                items: Vec::new(),
            });
        }

        // Searches for the same query share one flight whatever their limit;
        // a caller asking for more than the shared flight covered runs its own.
        let shared = format!(
            "{}|{}",
            normalize_query(query),
            language.as_deref().unwrap_or("any")
        );
        let (covered, mut result) = self
            .fly(shared.clone(), query, language.clone(), desired)
            .await;
        if covered < desired {
            result = self
                .fly(format!("{shared}|{desired}"), query, language, desired)
                .await
                .1;
        }

        result.query = query.to_string();
        result.items.truncate(desired);
        Ok(result)
    }

    /// Join or start the flight under `key`; yields the limit it ran with.
    async fn fly(
        self: &Arc<Self>,
        key: String,
        query: &str,
        language: Option<String>,
        desired: usize,
    ) -> (usize, SearchResult) {
        let this = Arc::clone(self);
        let query = query.to_string();
        self.flights
            .resolve(key, move |_| async move {
                (desired, this.run(&query, language, desired).await)
            })
            .await
    }

    async fn run(&self, query: &str, language: Option<String>, desired: usize) -> SearchResult {
        let started = Instant::now();
        let baseline = self.local_baseline(query, desired).await;

        let fallback_enabled = self.settings.load().external_fallback_enabled;
        if baseline.len() >= desired || !fallback_enabled {
            metrics::record_search("local", started);
            return SearchResult {
                query: query.to_string(),
                language,
                items: merge_results(baseline, Vec::new(), desired),
            };
        }

        let exclude: HashSet<String> = baseline
            .iter()
            .flat_map(|hit| hit.record.identity_keys())
            .collect();
        let key = SearchKey::new(query, language.as_deref(), desired - baseline.len())
            .excluding(exclude);

        let outcome = self.augmentation.walk(&key).await;
        let (external, path) = match outcome.hit {
            Some(hit) => {
                let path = if hit.kind == TierKind::Upstream {
                    "external"
                } else {
                    "cached"
                };
                (hit.value.items, path)
            }
            None => (Vec::new(), "degraded"),
        };

        metrics::record_search(path, started);
        SearchResult {
            query: query.to_string(),
            language,
            items: merge_results(baseline, external, desired),
        }
    }

    /// Local index hits hydrated into records, in index order.
    async fn local_baseline(&self, query: &str, desired: usize) -> Vec<SearchHit> {
        let hits = match self.index.search(query, desired).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Local index search failed, continuing without baseline");
                return Vec::new();
            }
        };

        let lookups = hits.iter().map(|hit| self.books.get(&hit.id));
        join_all(lookups)
            .await
            .into_iter()
            .zip(hits.iter())
            .filter_map(|(outcome, hit)| match outcome {
                Ok(Some(record)) => Some(SearchHit::local(record)),
                Ok(None) => {
                    tracing::debug!(id = %hit.id, "Indexed book could not be hydrated");
                    None
                }
                Err(e) => {
                    tracing::warn!(id = %hit.id, error = %e, "Indexed book hydration failed");
                    None
                }
            })
            .collect()
    }
}

/// Baseline first, then external results not already present, truncated.
pub fn merge_results(
    baseline: Vec<SearchHit>,
    external: Vec<SearchHit>,
    desired: usize,
) -> Vec<SearchHit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::with_capacity(desired);

    for hit in baseline.into_iter().chain(external) {
        if merged.len() >= desired {
            break;
        }
        if hit.record.identity_keys().any(|k| seen.contains(&k)) {
            continue;
        }
        seen.extend(hit.record.identity_keys());
        merged.push(hit);
    }
    merged
}
