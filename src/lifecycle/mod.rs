//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Resolver (tiers, breaker, index) → bind listeners → serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → servers stop accepting and drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Listeners are bound by the caller so tests can use ephemeral ports
//! - Shutdown has a deadline: servers still draining after it are abandoned

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_shutdown_signal;
pub use startup::{Application, Listeners, StartupError};
