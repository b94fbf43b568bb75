//! Book metadata resolver library.
//!
//! Resolves book records and search results through layered caches in front
//! of a rate-limited upstream volumes API.

pub mod admin;
pub mod cache;
pub mod config;
pub mod http;
pub mod index;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod upstream;

pub use config::ResolverConfig;
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
pub use pipeline::Resolver;
