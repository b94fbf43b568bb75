//! Admin API.
//!
//! Served on its own bind address, separate from the public API, and guarded
//! by a static Bearer token from `[admin]`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/breaker", get(get_breaker))
        .route("/admin/breaker/reset", post(reset_breaker))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .with_state(state)
}
