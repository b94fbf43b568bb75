//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the public Axum router (`/books/{id}`, `/search`, `/health`)
//! - Wire middleware: request id, tracing, request timeout
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ResolverConfig;
use crate::http::handlers;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::pipeline::Resolver;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub config: Arc<ArcSwap<ResolverConfig>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(resolver: Arc<Resolver>, config: ResolverConfig) -> Self {
        Self {
            resolver,
            config: Arc::new(ArcSwap::from_pointee(config)),
            started_at: Instant::now(),
        }
    }

    /// Apply a reloaded configuration. Only search settings and the admin
    /// key take effect without a restart; other changed sections are logged
    /// and returned.
    pub fn apply_config(&self, config: ResolverConfig) -> Vec<&'static str> {
        let pending = config.restart_required_changes(&self.config.load());
        if !pending.is_empty() {
            tracing::warn!(
                sections = ?pending,
                "Reloaded configuration changes sections that only apply after a restart"
            );
        }
        self.resolver.update_search_settings(config.search.clone());
        self.config.store(Arc::new(config));
        tracing::info!("Configuration reloaded");
        pending
    }
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let request_timeout = Duration::from_secs(state.config.load().listener.request_timeout_secs);
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .route("/books/{id}", get(handlers::get_book))
            .route("/search", get(handlers::search))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(propagate_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        serve(listener, self.router, shutdown, "HTTP server").await
    }
}

/// Serve a router with graceful shutdown on the broadcast signal.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    mut shutdown: broadcast::Receiver<()>,
    name: &'static str,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, server = name, "Server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!(server = name, "Server stopped");
    Ok(())
}
