//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, middleware stack)
//!     → request.rs (x-request-id assigned and echoed)
//!     → handlers.rs (books, search, health)
//!     → pipeline::Resolver
//!     → response.rs (errors as JSON)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{serve, AppState, HttpServer};
