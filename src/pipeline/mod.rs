//! Resolution pipeline.
//!
//! # Data Flow
//! ```text
//! get_book(id)
//!     → books.rs (single-flight per id)
//!     → fetch.rs (tier order, fail-open/closed)
//!     → tiered.rs (walk + backfill over cache::*)
//!
//! search(query, language, limit)
//!     → search.rs (single-flight per query)
//!     → index (baseline) + books.rs (hydration)
//!     → tiered.rs over [local_file, durable_store, external.rs]
//! ```
//!
//! # Design Decisions
//! - Book and search lookups use separate single-flight keyspaces
//! - Everything is built once from config; only search settings hot-reload

pub mod author;
pub mod books;
pub mod external;
pub mod fetch;
pub mod search;
pub mod single_flight;
pub mod tiered;

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::cache::{
    BlobStore, DurableStoreTier, FixtureTier, FsBlobStore, LocalFileCache, MemoryBlobStore, Tier,
    TierError, UpstreamTier,
};
use crate::config::{DurableBackend, ResolverConfig, SearchConfig};
use crate::index::{InMemoryIndex, LocalIndex};
use crate::model::{CachedSearch, Record, SearchKey, SearchResult};
use crate::observability::SharedMonitor;
use crate::resilience::{BackoffPolicy, BreakerSettings, CircuitBreaker};
use crate::upstream::{
    CatalogClient, CatalogSearchProvider, SearchProvider, UpstreamError, VolumesClient,
    VolumesSearchProvider,
};

pub use books::{BookOutcome, BookService};
pub use external::ExternalSearchTier;
pub use fetch::{BookTiers, FetchError, FetchOptions, TieredFetchOrchestrator};
pub use search::{merge_results, SearchError, TieredSearchCoordinator};
pub use single_flight::SingleFlight;
pub use tiered::{TierChain, TierHit, WalkOutcome};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("upstream client: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("local cache: {0}")]
    Tier(#[from] TierError),
}

/// Fully wired resolver: book fetch, search, and the breaker they share.
pub struct Resolver {
    books: Arc<BookService>,
    search: Arc<TieredSearchCoordinator>,
    breaker: Arc<CircuitBreaker>,
    index: Arc<InMemoryIndex>,
}

impl Resolver {
    pub async fn build(config: &ResolverConfig, monitor: SharedMonitor) -> Result<Self, BuildError> {
        // 1. Upstream clients
        let breaker = Arc::new(CircuitBreaker::new(
            "volumes",
            BreakerSettings::from_config(&config.breaker),
        ));
        let volumes = Arc::new(VolumesClient::new(
            &config.upstream,
            Arc::clone(&breaker),
            BackoffPolicy::from_config(&config.retries),
            Arc::clone(&monitor),
        )?);

        // 2. Storage tiers
        let tiers = &config.tiers;
        let local = tiers
            .local_file_enabled
            .then(|| Arc::new(LocalFileCache::new(&tiers.cache_dir)));
        let durable = tiers.durable_enabled.then(|| {
            let store: Arc<dyn BlobStore> = match tiers.durable_backend {
                DurableBackend::Filesystem => Arc::new(FsBlobStore::new(&tiers.durable_dir)),
                DurableBackend::Memory => Arc::new(MemoryBlobStore::new()),
            };
            Arc::new(DurableStoreTier::new(store))
        });

        let orchestrator = Arc::new(TieredFetchOrchestrator::new(
            BookTiers {
                local_file: local.clone().map(|t| t as Arc<dyn Tier<String, Record>>),
                fixture: tiers
                    .fixture_enabled
                    .then(|| Arc::new(FixtureTier::new(&tiers.fixture_dir)) as Arc<dyn Tier<String, Record>>),
                durable: durable.clone().map(|t| t as Arc<dyn Tier<String, Record>>),
                upstream: Some(Arc::new(UpstreamTier::new(Arc::clone(&volumes)))),
            },
            FetchOptions {
                always_check_durable_first: tiers.always_check_durable_first,
                fail_closed: tiers.fail_closed,
            },
        ));
        let books = Arc::new(BookService::new(orchestrator));

        // 3. Local index, seeded from the file cache
        let index = Arc::new(match &local {
            Some(cache) => {
                let records = cache.load_all_books().await?;
                tracing::info!(books = records.len(), "Local index seeded from cache");
                InMemoryIndex::from_records(records.iter())
            }
            None => InMemoryIndex::new(),
        });

        // 4. Search augmentation chain
        let settings = Arc::new(ArcSwap::from_pointee(config.search.clone()));
        let providers = build_providers(config, &volumes, &monitor)?;
        let mut search_tiers: Vec<Arc<dyn Tier<SearchKey, CachedSearch>>> = Vec::new();
        if let Some(cache) = &local {
            search_tiers.push(cache.clone());
        }
        if let Some(store) = &durable {
            search_tiers.push(store.clone());
        }
        let external = ExternalSearchTier::new(providers, Arc::clone(&settings));
        tracing::info!(providers = ?external.provider_names(), "Search providers configured");
        search_tiers.push(Arc::new(external));

        let search = Arc::new(TieredSearchCoordinator::new(
            index.clone() as Arc<dyn LocalIndex>,
            Arc::clone(&books),
            TierChain::new("searches", search_tiers),
            settings,
        ));

        tracing::info!(
            tiers = ?books.orchestrator().tier_order(),
            authenticated = volumes.has_api_key(),
            "Resolver ready"
        );

        Ok(Self {
            books,
            search,
            breaker,
            index,
        })
    }

    /// Resolve a book by id. Resolved records join the local index so later
    /// searches can find them without the upstream.
    pub async fn get_book(&self, id: &str) -> BookOutcome {
        let outcome = self.books.get(id).await;
        if let Ok(Some(record)) = &outcome {
            self.index.insert(record);
        }
        outcome
    }

    pub async fn search(
        &self,
        query: &str,
        language: Option<&str>,
        limit: Option<usize>,
    ) -> Result<SearchResult, SearchError> {
        self.search.search(query, language, limit).await
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn indexed_books(&self) -> usize {
        self.index.len()
    }

    pub fn search_settings(&self) -> Arc<SearchConfig> {
        self.search.settings()
    }

    pub fn update_search_settings(&self, settings: SearchConfig) {
        self.search.update_settings(settings);
    }
}

fn build_providers(
    config: &ResolverConfig,
    volumes: &Arc<VolumesClient>,
    monitor: &SharedMonitor,
) -> Result<Vec<Arc<dyn SearchProvider>>, UpstreamError> {
    let mut providers: Vec<Arc<dyn SearchProvider>> = Vec::new();
    if volumes.has_api_key() {
        providers.push(Arc::new(VolumesSearchProvider::keyed(Arc::clone(volumes))));
    }
    providers.push(Arc::new(VolumesSearchProvider::anonymous(Arc::clone(volumes))));

    if config.search.secondary_enabled {
        let catalog = CatalogClient::new(
            &config.search.secondary_base_url,
            config.search.provider_timeout(),
            Arc::clone(monitor),
        )?;
        providers.push(Arc::new(CatalogSearchProvider::new(Arc::new(catalog))));
    }
    Ok(providers)
}
