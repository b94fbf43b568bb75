//! Tiered book fetch.
//!
//! # Tier Order
//! ```text
//! always_check_durable_first = true  (default)
//!     local_file → fixture → durable_store → upstream
//!
//! always_check_durable_first = false
//!     local_file → fixture → upstream → durable_store
//!     (an upstream hit is still written through to durable_store)
//! ```
//!
//! # Failure Modes
//! - Tier errors are misses
//! - Upstream failure with nothing found: `Ok(None)`, or
//!   `Err(UpstreamUnavailable)` when `fail_closed` is set
//! - Malformed ids are rejected before any tier is touched

use std::sync::Arc;

use thiserror::Error;

use crate::cache::{Tier, TierError};
use crate::model::{is_valid_book_id, Record, TierKind};
use crate::pipeline::tiered::TierChain;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid book id '{0}'")]
    InvalidKey(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub always_check_durable_first: bool,
    pub fail_closed: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            always_check_durable_first: true,
            fail_closed: false,
        }
    }
}

/// The tiers a fetch may use; any of them can be absent.
#[derive(Default)]
pub struct BookTiers {
    pub local_file: Option<Arc<dyn Tier<String, Record>>>,
    pub fixture: Option<Arc<dyn Tier<String, Record>>>,
    pub durable: Option<Arc<dyn Tier<String, Record>>>,
    pub upstream: Option<Arc<dyn Tier<String, Record>>>,
}

pub struct TieredFetchOrchestrator {
    chain: TierChain<String, Record>,
    options: FetchOptions,
}

impl TieredFetchOrchestrator {
    pub fn new(tiers: BookTiers, options: FetchOptions) -> Self {
        let BookTiers {
            local_file,
            fixture,
            durable,
            upstream,
        } = tiers;

        let ordered = if options.always_check_durable_first {
            [local_file, fixture, durable, upstream]
        } else {
            [local_file, fixture, upstream, durable]
        };

        Self {
            chain: TierChain::new("books", ordered.into_iter().flatten().collect()),
            options,
        }
    }

    pub fn tier_order(&self) -> Vec<TierKind> {
        self.chain.kinds()
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<Record>, FetchError> {
        if !is_valid_book_id(id) {
            return Err(FetchError::InvalidKey(id.to_string()));
        }

        let key = id.to_string();
        let outcome = self.chain.walk(&key).await;

        if let Some(hit) = outcome.hit {
            if hit.kind == TierKind::Upstream && !self.options.always_check_durable_first {
                if let Some(durable) = self.chain.position(TierKind::DurableStore) {
                    self.chain
                        .backfill(&key, &hit.value, durable..durable + 1)
                        .await;
                }
            }
            return Ok(Some(hit.value));
        }

        if self.options.fail_closed {
            if let Some(TierError::Unavailable(reason)) = outcome.error_from(TierKind::Upstream) {
                return Err(FetchError::UpstreamUnavailable(reason.clone()));
            }
        }

        tracing::debug!(id = %id, "Book not found in any tier");
        Ok(None)
    }
}
