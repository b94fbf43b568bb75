//! Book metadata resolver.
//!
//! # Architecture Overview
//!
//! ```text
//!     GET /books/{id}                 GET /search?q=
//!          │                                │
//!          ▼                                ▼
//!   ┌──────────────┐               ┌─────────────────┐
//!   │ single-flight│               │  single-flight  │
//!   └──────┬───────┘               └────────┬────────┘
//!          ▼                                ▼
//!   ┌──────────────┐      local index ─▶ baseline hits
//!   │ tier chain   │                        │ shortfall
//!   │ local file   │                        ▼
//!   │ fixture      │               ┌─────────────────┐
//!   │ durable store│               │ search tiers    │
//!   │ upstream ────┼──┐            │ local / durable │
//!   └──────────────┘  │            │ external ───────┼──┐
//!                     ▼            └─────────────────┘  ▼
//!              ┌─────────────────────────────────────────────┐
//!              │ retrying client + circuit breaker (upstream)│
//!              └─────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use book_resolver::config::{load_config, watcher::ConfigWatcher, ResolverConfig};
use book_resolver::lifecycle::{wait_for_shutdown_signal, Application, Listeners};
use book_resolver::observability::{default_monitor, logging::init_logging, metrics::init_metrics};

#[derive(Parser)]
#[command(name = "book-resolver")]
#[command(about = "Book metadata resolver with tiered caching", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ResolverConfig::default(),
    };

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "book-resolver starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listeners = Listeners::bind(&config).await?;
    tracing::info!(
        address = %listeners.public.local_addr()?,
        admin = listeners.admin.is_some(),
        "Listening for connections"
    );

    let app = Application::build(config, default_monitor()).await?;

    // Keep the watcher alive for the lifetime of the process.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let state = app.state().clone();
            tokio::spawn(async move {
                while let Some(new_config) = updates.recv().await {
                    state.apply_config(new_config);
                }
            });
            match watcher.run() {
                Ok(w) => Some(w),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    app.run_until(listeners, wait_for_shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
