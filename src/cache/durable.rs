//! Durable blob store tier.
//!
//! # Responsibilities
//! - Abstract over a remote-style key/value blob store (`BlobStore`)
//! - Keep "not found" and "unavailable" apart so an outage is never
//!   mistaken for a negative answer
//! - Serve books and cached searches under the same key layout as the
//!   local file tier
//!
//! # Design Decisions
//! - The filesystem backend is the default; the in-memory one backs tests
//!   and single-process deployments
//! - Blob keys are relative paths and are validated like file paths

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;

use crate::cache::fs::{read_optional, resolve_under, write_atomic};
use crate::cache::tier::{Tier, TierError};
use crate::model::{CachedSearch, Record, SearchKey, TierKind};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid blob key '{0}'")]
    InvalidKey(String),
}

impl From<StoreError> for TierError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => TierError::Unavailable(reason),
            StoreError::InvalidKey(key) => TierError::Io(format!("invalid blob key '{key}'")),
        }
    }
}

/// Key/value blob storage. `get` returns `Ok(None)` only for a definite miss.
pub trait BlobStore: Send + Sync + Debug {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>>;

    fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Keys starting with `prefix`, sorted.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, StoreError>>;
}

/// Blob store rooted in a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        resolve_under(&self.root, key).map_err(|_| StoreError::InvalidKey(key.to_string()))
    }
}

impl BlobStore for FsBlobStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        async move {
            read_optional(&self.path(key)?)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            write_atomic(&self.path(key)?, &bytes)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))
        }
        .boxed()
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, StoreError>> {
        async move {
            // Keys are at most two levels deep: `<dir>/<name>.json`.
            let (dir, _) = prefix.rsplit_once('/').unwrap_or(("", prefix));
            let dir_path = if dir.is_empty() {
                self.root.clone()
            } else {
                self.path(dir)?
            };

            let mut entries = match tokio::fs::read_dir(&dir_path).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(StoreError::Unavailable(e.to_string())),
            };

            let mut keys = BTreeSet::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?
            {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if name.starts_with('.') {
                    continue;
                }
                let key = if dir.is_empty() {
                    name
                } else {
                    format!("{dir}/{name}")
                };
                if key.starts_with(prefix) {
                    keys.insert(key);
                }
            }
            Ok(keys.into_iter().collect())
        }
        .boxed()
    }
}

/// In-process blob store. Can be switched offline to simulate an outage.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.offline.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl BlobStore for MemoryBlobStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>> {
        async move {
            self.check()?;
            Ok(self.blobs.get(key).map(|entry| entry.value().clone()))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a str, bytes: Vec<u8>) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            self.check()?;
            self.blobs.insert(key.to_string(), bytes);
            Ok(())
        }
        .boxed()
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>, StoreError>> {
        async move {
            self.check()?;
            let mut keys: Vec<String> = self
                .blobs
                .iter()
                .filter(|entry| entry.key().starts_with(prefix))
                .map(|entry| entry.key().clone())
                .collect();
            keys.sort();
            Ok(keys)
        }
        .boxed()
    }
}

/// Tier adapter over any `BlobStore`.
#[derive(Debug, Clone)]
pub struct DurableStoreTier {
    store: Arc<dyn BlobStore>,
}

impl DurableStoreTier {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }
}

fn book_key(id: &str) -> String {
    format!("books/{id}.json")
}

impl Tier<String, Record> for DurableStoreTier {
    fn kind(&self) -> TierKind {
        TierKind::DurableStore
    }

    fn get<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Option<Record>, TierError>> {
        async move {
            let Some(bytes) = self.store.get(&book_key(key)).await? else {
                return Ok(None);
            };
            let record: Record = serde_json::from_slice(&bytes)?;
            Ok(Some(record.with_provenance(TierKind::DurableStore)))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a String, value: &'a Record) -> BoxFuture<'a, Result<(), TierError>> {
        async move {
            let bytes = serde_json::to_vec(value)?;
            self.store.put(&book_key(key), bytes).await?;
            Ok(())
        }
        .boxed()
    }
}

impl Tier<SearchKey, CachedSearch> for DurableStoreTier {
    fn kind(&self) -> TierKind {
        TierKind::DurableStore
    }

    fn get<'a>(&'a self, key: &'a SearchKey) -> BoxFuture<'a, Result<Option<CachedSearch>, TierError>> {
        async move {
            let Some(bytes) = self.store.get(&key.storage_path()).await? else {
                return Ok(None);
            };
            let entry: CachedSearch = serde_json::from_slice(&bytes)?;
            Ok(entry.satisfies(key.want, &key.exclude).then_some(entry))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a SearchKey, value: &'a CachedSearch) -> BoxFuture<'a, Result<(), TierError>> {
        async move {
            let bytes = serde_json::to_vec(value)?;
            self.store.put(&key.storage_path(), bytes).await?;
            Ok(())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_distinguishes_outage() {
        let store = MemoryBlobStore::new();
        assert_eq!(store.get("books/a.json").await, Ok(None));

        store.put("books/a.json", b"x".to_vec()).await.unwrap();
        assert_eq!(store.get("books/a.json").await, Ok(Some(b"x".to_vec())));

        store.set_available(false);
        assert!(matches!(
            store.get("books/a.json").await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_store_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("books/b.json", b"{}".to_vec()).await.unwrap();
        store.put("books/a.json", b"{}".to_vec()).await.unwrap();
        store.put("searches/dune-any.json", b"{}".to_vec()).await.unwrap();

        assert_eq!(
            store.list("books/").await.unwrap(),
            vec!["books/a.json", "books/b.json"]
        );
        assert!(store.list("missing/").await.unwrap().is_empty());
        assert!(matches!(
            store.get("../escape").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_tier_maps_outage_to_unavailable() {
        let store = Arc::new(MemoryBlobStore::new());
        let tier = DurableStoreTier::new(store.clone());
        let key = "abc".to_string();

        tier.put(&key, &Record::new("abc", "Dune", TierKind::Upstream))
            .await
            .unwrap();
        let record = Tier::<String, Record>::get(&tier, &key).await.unwrap().unwrap();
        assert_eq!(record.provenance, TierKind::DurableStore);

        store.set_available(false);
        let err = Tier::<String, Record>::get(&tier, &key).await.unwrap_err();
        assert!(matches!(err, TierError::Unavailable(_)));
    }
}
