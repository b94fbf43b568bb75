//! Domain types shared by every tier: book records, search hits, query keys.

pub mod record;
pub mod search;

pub use record::{is_valid_book_id, Record, TierKind};
pub use search::{normalize_query, CachedSearch, SearchHit, SearchKey, SearchResult, SearchSource};
