//! Upstream access: the volumes API and the secondary catalog.
//!
//! # Data Flow
//! ```text
//! book fetch   → client.rs (gated, retried) → types.rs (decode) → Record
//! search       → providers.rs → client.rs / catalog.rs → Vec<Record>
//! ```

pub mod catalog;
pub mod client;
pub mod error;
pub mod providers;
pub mod types;

pub use catalog::CatalogClient;
pub use client::{Auth, OrderBy, VolumeQuery, VolumesClient, MAX_RESULTS_PER_PAGE};
pub use error::{ErrorClass, UpstreamError};
pub use providers::{
    CatalogSearchProvider, ProviderQuery, QueryScope, SearchProvider, VolumesSearchProvider,
};
