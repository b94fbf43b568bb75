use axum::{extract::State, Json};
use serde::Serialize;

use crate::config::SearchConfig;
use crate::http::server::AppState;
use crate::resilience::BreakerSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub indexed_books: usize,
    pub breaker: BreakerSnapshot,
    pub search: SearchConfig,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let resolver = &state.resolver;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        indexed_books: resolver.indexed_books(),
        breaker: resolver.breaker().snapshot(),
        search: (*resolver.search_settings()).clone(),
    })
}

pub async fn get_breaker(State(state): State<AppState>) -> Json<BreakerSnapshot> {
    Json(state.resolver.breaker().snapshot())
}

/// Force the breaker closed, e.g. after a quota was raised.
pub async fn reset_breaker(State(state): State<AppState>) -> Json<BreakerSnapshot> {
    let breaker = state.resolver.breaker();
    breaker.reset();
    tracing::info!(breaker = %breaker.name(), "Breaker reset by admin");
    Json(breaker.snapshot())
}
