//! Local full-text index over known books.
//!
//! The index only answers "which ids match this query"; hydrating ids into
//! records goes through the regular book fetch path.

pub mod memory;

use futures_util::future::BoxFuture;
use serde::Serialize;
use thiserror::Error;

pub use memory::InMemoryIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Whole query equals the title.
    ExactTitle,
    /// Every query token appears in the title.
    Title,
    /// Every query token appears in an author name.
    Author,
    /// Some query tokens appear in title or authors.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexHit {
    pub id: String,
    pub score: f32,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("index unavailable: {0}")]
    Unavailable(String),
}

pub trait LocalIndex: Send + Sync {
    /// Best matches first, at most `limit`.
    fn search<'a>(&'a self, query: &'a str, limit: usize) -> BoxFuture<'a, Result<Vec<IndexHit>, IndexError>>;
}
