//! External search augmentation, exposed as the last tier of the search
//! cache chain.
//!
//! # Data Flow
//! ```text
//! get(key):
//!     for provider in [books_api, books_api_public, open_library]:
//!         skip if an earlier provider of the same family succeeded
//!         for scope in [author (name-like queries only), general]:
//!             with_timeout(provider.search) → absorb unique records
//!             stop once `key.want` new records are collected
//! ```
//!
//! # Design Decisions
//! - Each attempt has its own hard deadline; an expired or failed attempt
//!   just moves on to the next one
//! - Records are de-duplicated by identity across providers
//! - The entry is marked exhausted only when every attempt answered and the
//!   providers still came up short, so a degraded run is never cached as final

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::cache::{Tier, TierError};
use crate::config::SearchConfig;
use crate::model::{CachedSearch, SearchHit, SearchKey, TierKind};
use crate::pipeline::author::looks_like_author_name;
use crate::resilience::with_timeout;
use crate::upstream::{ProviderQuery, QueryScope, SearchProvider, MAX_RESULTS_PER_PAGE};

pub struct ExternalSearchTier {
    providers: Vec<Arc<dyn SearchProvider>>,
    settings: Arc<ArcSwap<SearchConfig>>,
}

impl ExternalSearchTier {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, settings: Arc<ArcSwap<SearchConfig>>) -> Self {
        Self { providers, settings }
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    async fn collect(&self, key: &SearchKey) -> Result<CachedSearch, TierError> {
        let timeout = self.settings.load().provider_timeout();
        let author_like = looks_like_author_name(&key.query);
        let limit = (key.want + key.exclude.len()).clamp(1, MAX_RESULTS_PER_PAGE as usize);

        let mut items: Vec<SearchHit> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut fresh = 0usize;
        let mut succeeded_families: HashSet<String> = HashSet::new();
        let mut failures = 0usize;
        let mut answered = 0usize;

        'providers: for provider in &self.providers {
            if fresh >= key.want {
                break;
            }
            if succeeded_families.contains(provider.family()) {
                continue;
            }

            let scopes: &[QueryScope] = if author_like && provider.supports_author_scope() {
                &[QueryScope::Author, QueryScope::General]
            } else {
                &[QueryScope::General]
            };

            for &scope in scopes {
                if fresh >= key.want {
                    break 'providers;
                }
                let query = ProviderQuery {
                    text: key.query.clone(),
                    language: key.language.clone(),
                    limit,
                    scope,
                };

                match with_timeout(timeout, provider.search(&query)).await {
                    Ok(Ok(records)) => {
                        answered += 1;
                        succeeded_families.insert(provider.family().to_string());
                        for record in records {
                            if record.identity_keys().any(|k| seen.contains(&k)) {
                                continue;
                            }
                            seen.extend(record.identity_keys());
                            if !record.identity_keys().any(|k| key.exclude.contains(&k)) {
                                fresh += 1;
                            }
                            items.push(SearchHit::external(record, provider.name()));
                        }
                    }
                    Ok(Err(e)) => {
                        failures += 1;
                        tracing::warn!(provider = %provider.name(), ?scope, error = %e, "External search attempt failed");
                    }
                    Err(e) => {
                        failures += 1;
                        tracing::warn!(provider = %provider.name(), ?scope, error = %e, "External search attempt timed out");
                    }
                }
            }
        }

        if answered == 0 && failures > 0 {
            return Err(TierError::Unavailable(
                "every external search attempt failed".to_string(),
            ));
        }

        Ok(CachedSearch {
            query: key.query.clone(),
            language: key.language.clone(),
            items,
            exhausted: failures == 0 && fresh < key.want,
            cached_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        })
    }
}

impl Tier<SearchKey, CachedSearch> for ExternalSearchTier {
    fn kind(&self) -> TierKind {
        TierKind::Upstream
    }

    fn get<'a>(&'a self, key: &'a SearchKey) -> BoxFuture<'a, Result<Option<CachedSearch>, TierError>> {
        async move {
            if self.providers.is_empty() || key.want == 0 {
                return Ok(None);
            }
            let entry = self.collect(key).await?;
            Ok((!entry.items.is_empty()).then_some(entry))
        }
        .boxed()
    }

    fn put<'a>(&'a self, _key: &'a SearchKey, _value: &'a CachedSearch) -> BoxFuture<'a, Result<(), TierError>> {
        async { Ok(()) }.boxed()
    }
}
