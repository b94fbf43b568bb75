//! Storage tiers.
//!
//! # Tier Order (cheapest first)
//! ```text
//! local_file.rs   JSON files under the cache directory
//! fixture.rs      recorded upstream payloads
//! durable.rs      blob store (filesystem or in-memory)
//! upstream.rs     the volumes API
//! ```
//!
//! All tiers implement `Tier<K, V>` from `tier.rs`; the lookup order and
//! backfill are owned by `pipeline::tiered`.

pub mod durable;
pub mod fixture;
pub mod fs;
pub mod local_file;
pub mod tier;
pub mod upstream;

pub use durable::{BlobStore, DurableStoreTier, FsBlobStore, MemoryBlobStore, StoreError};
pub use fixture::FixtureTier;
pub use local_file::LocalFileCache;
pub use tier::{Tier, TierError};
pub use upstream::UpstreamTier;
