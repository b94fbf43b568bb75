//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the resolver (tiers, breaker, index, search providers)
//! - Bind the public and admin listeners
//! - Serve until a shutdown signal, then drain within a deadline
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::setup_admin_router;
use crate::config::ResolverConfig;
use crate::http::server::{serve, AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::SharedMonitor;
use crate::pipeline::{BuildError, Resolver};

/// How long in-flight requests get to finish after shutdown is triggered.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to build resolver: {0}")]
    Build(#[from] BuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Bound sockets for the public API and, when enabled, the admin API.
pub struct Listeners {
    pub public: TcpListener,
    pub admin: Option<TcpListener>,
}

impl Listeners {
    /// Bind the addresses named in `config`.
    pub async fn bind(config: &ResolverConfig) -> Result<Self, StartupError> {
        let public = TcpListener::bind(&config.listener.bind_address).await?;
        let admin = if config.admin.enabled {
            Some(TcpListener::bind(&config.admin.bind_address).await?)
        } else {
            None
        };
        Ok(Self { public, admin })
    }
}

/// A fully wired resolver service, ready to serve.
pub struct Application {
    state: AppState,
    shutdown: Shutdown,
}

impl Application {
    pub async fn build(config: ResolverConfig, monitor: SharedMonitor) -> Result<Self, StartupError> {
        let resolver = Resolver::build(&config, monitor).await?;
        tracing::info!(
            indexed_books = resolver.indexed_books(),
            breaker = %resolver.breaker().name(),
            "Resolver built"
        );
        Ok(Self {
            state: AppState::new(Arc::new(resolver), config),
            shutdown: Shutdown::new(),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    pub async fn run_until<S>(&self, listeners: Listeners, signal: S) -> Result<(), StartupError>
    where
        S: Future<Output = ()>,
    {
        let mut servers = Vec::new();

        let public = HttpServer::new(self.state.clone());
        servers.push(tokio::spawn(
            public.run(listeners.public, self.shutdown.subscribe()),
        ));

        if let Some(admin) = listeners.admin {
            let router = setup_admin_router(self.state.clone());
            servers.push(tokio::spawn(serve(
                admin,
                router,
                self.shutdown.subscribe(),
                "Admin server",
            )));
        }

        signal.await;
        self.shutdown.trigger();

        let drain = async {
            for server in servers {
                server.await??;
            }
            Ok::<(), StartupError>(())
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, drain).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    grace_secs = SHUTDOWN_GRACE.as_secs(),
                    "Shutdown deadline exceeded, abandoning open connections"
                );
                Ok(())
            }
        }
    }
}
