//! Public API handlers.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::model::{Record, SearchResult};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Record>, ApiError> {
    match state.resolver.get_book(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::not_found(format!("book '{id}' not found"))),
    }
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>, ApiError> {
    let result = state
        .resolver
        .search(&params.q, params.lang.as_deref(), params.limit)
        .await?;
    tracing::debug!(query = %params.q, results = result.items.len(), "Search served");
    Ok(Json(result))
}

pub async fn health() -> impl IntoResponse {
    "ok"
}
