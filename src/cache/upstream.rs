//! The authoritative tier: the volumes API itself.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::cache::tier::{Tier, TierError};
use crate::model::{Record, TierKind};
use crate::upstream::{ErrorClass, UpstreamError, VolumesClient};

#[derive(Debug, Clone)]
pub struct UpstreamTier {
    client: Arc<VolumesClient>,
}

impl UpstreamTier {
    pub fn new(client: Arc<VolumesClient>) -> Self {
        Self { client }
    }
}

/// Only outages become `Unavailable`; a refused request or an unreadable
/// payload is not an outage and must not fail closed.
fn tier_error(err: UpstreamError) -> TierError {
    match err {
        UpstreamError::CircuitOpen => TierError::Unavailable(err.to_string()),
        UpstreamError::Decode(_) => TierError::Corrupt(err.to_string()),
        _ if err.class() == ErrorClass::Terminal => TierError::Rejected(err.to_string()),
        _ => TierError::Unavailable(err.to_string()),
    }
}

impl Tier<String, Record> for UpstreamTier {
    fn kind(&self) -> TierKind {
        TierKind::Upstream
    }

    fn get<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Option<Record>, TierError>> {
        async move {
            self.client
                .get_volume(key)
                .await
                .map_err(tier_error)
        }
        .boxed()
    }

    /// Never a backfill target.
    fn put<'a>(&'a self, _key: &'a String, _value: &'a Record) -> BoxFuture<'a, Result<(), TierError>> {
        async { Ok(()) }.boxed()
    }
}
