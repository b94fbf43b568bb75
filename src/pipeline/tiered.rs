//! Ordered tier walk with backfill.
//!
//! # Data Flow
//! ```text
//! walk(key):
//!     tier[0].get → miss
//!     tier[1].get → error (logged, treated as miss, remembered)
//!     tier[2].get → hit
//!         → put into tier[0], tier[1]   (backfill, failures logged and swallowed)
//!         → return hit
//! ```
//!
//! # Design Decisions
//! - Backfill completes before the hit is returned, so an immediate repeat
//!   lookup is served by the cheapest tier
//! - Backfill writes run concurrently; one slow tier does not serialize the rest
//! - A tier error never aborts the walk

use std::sync::Arc;

use futures_util::future::join_all;

use crate::cache::{Tier, TierError};
use crate::model::TierKind;
use crate::observability::metrics;

/// Value found by a walk and the position of the tier that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TierHit<V> {
    pub value: V,
    pub index: usize,
    pub kind: TierKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkOutcome<V> {
    pub hit: Option<TierHit<V>>,
    /// Tiers that failed during the walk, in order.
    pub errors: Vec<(TierKind, TierError)>,
}

impl<V> WalkOutcome<V> {
    pub fn error_from(&self, kind: TierKind) -> Option<&TierError> {
        self.errors.iter().find(|(k, _)| *k == kind).map(|(_, e)| e)
    }
}

pub struct TierChain<K, V> {
    name: &'static str,
    tiers: Vec<Arc<dyn Tier<K, V>>>,
}

impl<K, V> TierChain<K, V>
where
    K: Send + Sync,
    V: Send + Sync,
{
    pub fn new(name: &'static str, tiers: Vec<Arc<dyn Tier<K, V>>>) -> Self {
        Self { name, tiers }
    }

    pub fn kinds(&self) -> Vec<TierKind> {
        self.tiers.iter().map(|t| t.kind()).collect()
    }

    pub fn position(&self, kind: TierKind) -> Option<usize> {
        self.tiers.iter().position(|t| t.kind() == kind)
    }

    pub async fn walk(&self, key: &K) -> WalkOutcome<V> {
        let mut errors = Vec::new();

        for (index, tier) in self.tiers.iter().enumerate() {
            let kind = tier.kind();
            match tier.get(key).await {
                Ok(Some(value)) => {
                    metrics::record_tier_hit(kind.as_str());
                    self.backfill(key, &value, 0..index).await;
                    return WalkOutcome {
                        hit: Some(TierHit { value, index, kind }),
                        errors,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(chain = self.name, tier = %kind, error = %e, "Tier lookup failed, treating as miss");
                    metrics::record_tier_error(kind.as_str());
                    errors.push((kind, e));
                }
            }
        }

        WalkOutcome { hit: None, errors }
    }

    /// Write `value` into the tiers at `indices`. Failures are logged only.
    pub async fn backfill(&self, key: &K, value: &V, indices: std::ops::Range<usize>) {
        let end = indices.end.min(self.tiers.len());
        let start = indices.start.min(end);
        let writes = self.tiers[start..end]
            .iter()
            .map(|tier| async move {
                if let Err(e) = tier.put(key, value).await {
                    tracing::warn!(chain = self.name, tier = %tier.kind(), error = %e, "Backfill failed");
                    metrics::record_backfill_failure(tier.kind().as_str());
                }
            });
        join_all(writes).await;
    }
}
