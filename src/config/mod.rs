//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → ResolverConfig (validated, immutable)
//!     → sections handed to each component at construction
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads + validates
//!     → search settings swapped atomically in the coordinator
//! ```
//!
//! # Design Decisions
//! - All fields have defaults so an empty file is a valid config
//! - Validation separates syntactic (serde) from semantic checks
//! - Only search settings are hot-reloadable; breaker/tier wiring is fixed at startup

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, BreakerPolicyKind, DurableBackend, ListenerConfig, LogFormat,
    ObservabilityConfig, ResolverConfig, RetryConfig, SearchConfig, TierConfig, UpstreamConfig,
};
