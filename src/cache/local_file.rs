//! Local JSON file cache.
//!
//! Layout under the cache directory:
//! ```text
//! books/<id>.json                       one Record per file
//! searches/<normalized>-<lang>.json     one CachedSearch per file
//! ```

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::cache::fs::{read_optional, resolve_under, write_atomic};
use crate::cache::tier::{Tier, TierError};
use crate::model::{CachedSearch, Record, SearchKey, TierKind};

#[derive(Debug, Clone)]
pub struct LocalFileCache {
    root: PathBuf,
}

impl LocalFileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn book_path(&self, id: &str) -> Result<PathBuf, TierError> {
        Ok(resolve_under(&self.root, &format!("books/{id}.json"))?)
    }

    fn search_path(&self, key: &SearchKey) -> Result<PathBuf, TierError> {
        Ok(resolve_under(&self.root, &key.storage_path())?)
    }

    /// Every record currently cached, used to seed the local index.
    pub async fn load_all_books(&self) -> Result<Vec<Record>, TierError> {
        let dir = self.root.join("books");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Record>(&bytes) {
                Ok(record) => records.push(record.with_provenance(TierKind::LocalFile)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt cache file")
                }
            }
        }
        Ok(records)
    }
}

impl Tier<String, Record> for LocalFileCache {
    fn kind(&self) -> TierKind {
        TierKind::LocalFile
    }

    fn get<'a>(&'a self, key: &'a String) -> BoxFuture<'a, Result<Option<Record>, TierError>> {
        async move {
            let path = self.book_path(key)?;
            let Some(bytes) = read_optional(&path).await? else {
                return Ok(None);
            };
            let record: Record = serde_json::from_slice(&bytes)?;
            Ok(Some(record.with_provenance(TierKind::LocalFile)))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a String, value: &'a Record) -> BoxFuture<'a, Result<(), TierError>> {
        async move {
            let path = self.book_path(key)?;
            let bytes = serde_json::to_vec_pretty(value)?;
            write_atomic(&path, &bytes).await?;
            Ok(())
        }
        .boxed()
    }
}

impl Tier<SearchKey, CachedSearch> for LocalFileCache {
    fn kind(&self) -> TierKind {
        TierKind::LocalFile
    }

    fn get<'a>(&'a self, key: &'a SearchKey) -> BoxFuture<'a, Result<Option<CachedSearch>, TierError>> {
        async move {
            let path = self.search_path(key)?;
            let Some(bytes) = read_optional(&path).await? else {
                return Ok(None);
            };
            let entry: CachedSearch = serde_json::from_slice(&bytes)?;
            Ok(entry.satisfies(key.want, &key.exclude).then_some(entry))
        }
        .boxed()
    }

    fn put<'a>(&'a self, key: &'a SearchKey, value: &'a CachedSearch) -> BoxFuture<'a, Result<(), TierError>> {
        async move {
            let path = self.search_path(key)?;
            let bytes = serde_json::to_vec_pretty(value)?;
            write_atomic(&path, &bytes).await?;
            Ok(())
        }
        .boxed()
    }
}
