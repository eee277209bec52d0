//! HTTP request handlers

use super::params::QueryParams;
use super::state::AppState;
use crate::error::{GatewayError, Result};
use crate::orchestrator::ResponseEnvelope;
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::collections::HashMap;
use tracing::info;

/// Merge query-string and body parameters
fn collect_params(
    query: std::result::Result<Query<QueryParams>, QueryRejection>,
    body: &Bytes,
) -> Result<QueryParams> {
    let Query(from_query) =
        query.map_err(|e| GatewayError::InvalidArgument(e.body_text()))?;
    let from_body = QueryParams::from_body(body)?;
    Ok(from_query.merge(from_body))
}

/// Chat completion handler, optionally search-augmented
pub async fn chat(
    State(state): State<AppState>,
    query: std::result::Result<Query<QueryParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<ResponseEnvelope>> {
    info!("Processing chat completion request.");

    let params = collect_params(query, &body)?;
    let text = params
        .query_text()
        .ok_or_else(|| GatewayError::missing("Missing 'query' in request body."))?;

    let search_text = if params.use_search() {
        params.search_text()
    } else {
        None
    };

    let envelope = state
        .orchestrator
        .complete_with(text, search_text, params.top)
        .await?;

    Ok(Json(envelope))
}

/// Search handler; returns the index results verbatim
pub async fn search(
    State(state): State<AppState>,
    query: std::result::Result<Query<QueryParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<serde_json::Value>> {
    info!("Processing search request.");

    let params = collect_params(query, &body)?;
    let text = params
        .search_text()
        .ok_or_else(|| GatewayError::missing("Missing 'searchQuery' in request."))?;

    let top = params.top.unwrap_or_else(|| state.default_top());
    let results = state.search.search(text, top).await?;

    Ok(Json(serde_json::json!({ "search_results": results })))
}

/// Upsert the JSON body as a document
pub async fn upsert_document(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let store = state
        .documents
        .as_ref()
        .ok_or_else(|| GatewayError::Unexpected(anyhow::anyhow!("document store is not configured")))?;

    let document: serde_json::Value = serde_json::from_slice(&body).map_err(|e| {
        GatewayError::InvalidArgument(format!("Invalid JSON in request body: {}", e))
    })?;

    store.upsert(document).await?;
    Ok((StatusCode::OK, "Document upserted."))
}

/// Read a document by id and partition key
pub async fn read_document(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>> {
    let store = state
        .documents
        .as_ref()
        .ok_or_else(|| GatewayError::Unexpected(anyhow::anyhow!("document store is not configured")))?;

    let key_name = store.partition_key_name();
    let id = params.get("id").filter(|v| !v.is_empty());
    let key = params.get(key_name).filter(|v| !v.is_empty());

    match (id, key) {
        (Some(id), Some(key)) => Ok(Json(store.read(id, key).await?)),
        _ => Err(GatewayError::missing(format!(
            "Missing 'id' or '{}' query parameters.",
            key_name
        ))),
    }
}

/// Any other method on a document route
pub async fn unsupported_method() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "Unsupported HTTP method.")
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}
