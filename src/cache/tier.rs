//! The storage tier contract.

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::model::TierKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TierError {
    #[error("i/o error: {0}")]
    Io(String),

    #[error("corrupt entry: {0}")]
    Corrupt(String),

    #[error("tier unavailable: {0}")]
    Unavailable(String),

    /// The tier answered but refused the request (bad credentials, bad key).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for TierError {
    fn from(err: std::io::Error) -> Self {
        TierError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TierError {
    fn from(err: serde_json::Error) -> Self {
        TierError::Corrupt(err.to_string())
    }
}

/// One level of a tiered lookup.
///
/// `get` returning `Ok(None)` is a miss. Errors are also treated as misses by
/// the chain, but they are logged and remembered so the caller can decide
/// whether an upstream failure should surface.
pub trait Tier<K, V>: Send + Sync {
    fn kind(&self) -> TierKind;

    fn get<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>, TierError>>;

    /// Store a value found in a more expensive tier.
    fn put<'a>(&'a self, key: &'a K, value: &'a V) -> BoxFuture<'a, Result<(), TierError>>;
}
