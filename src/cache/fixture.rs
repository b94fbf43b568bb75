//! Recorded upstream payloads.
//!
//! Files hold the raw volume JSON exactly as the upstream returned it, so a
//! fixture directory can stand in for the upstream in tests and demos. When
//! the tier is enabled, upstream hits are recorded through the backfill path.

use std::path::PathBuf;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::cache::fs::{read_optional, resolve_under, write_atomic};
use crate::cache::tier::{Tier, TierError};
use crate::model::{Record, TierKind};
use crate::upstream::types::record_from_volume;

#[derive(Debug, Clone)]
pub struct FixtureTier {
    root: PathBuf,
}

impl FixtureTier {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, id: &str) -> Result<PathBuf, TierError> {
        Ok(resolve_under(&self.root, &format!("books/{id}.json"))?)
    }
}

impl Tier<String, Record> for FixtureTier {
    fn kind(&self) -> TierKind {
        TierKind::Fixture
    }

    fn get<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Option<Record>, TierError>> {
        async move {
            let Some(bytes) = read_optional(&self.path(key)?).await? else {
                return Ok(None);
            };
            let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
            let record = record_from_volume(raw, TierKind::Fixture)
                .map_err(|e| TierError::Corrupt(e.to_string()))?;
            Ok(Some(record))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a String, value: &'a Record) -> BoxFuture<'a, Result<(), TierError>> {
        async move {
            // Only provider payloads can be replayed.
            if value.raw.is_null() {
                return Ok(());
            }
            let bytes = serde_json::to_vec_pretty(&value.raw)?;
            write_atomic(&self.path(key)?, &bytes).await?;
            Ok(())
        }
        .boxed()
    }
}
