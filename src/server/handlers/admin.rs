// src/server/handlers/admin.rs
//! Health, statistics and configuration reload

use crate::server::ProxyState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    metrics: crate::server::MetricsSnapshot,
    rules: usize,
    upstreams: usize,
    cache_entries: usize,
    cache_capacity: usize,
}

/// GET /admin/stats
pub async fn stats(State(state): State<Arc<ProxyState>>) -> Json<serde_json::Value> {
    let config = state.snapshot().await.config;
    let response = StatsResponse {
        metrics: state.metrics.snapshot(),
        rules: config.rules.len(),
        upstreams: config.upstreams.len(),
        cache_entries: state.cache.len(),
        cache_capacity: state.cache.capacity(),
    };
    Json(serde_json::to_value(&response).unwrap_or_default())
}

#[derive(Serialize)]
struct ReloadResponse {
    status: &'static str,
    rules: Vec<String>,
    upstreams: Vec<String>,
}

/// POST /admin/reload
///
/// Swaps in a freshly loaded configuration. On error the old one stays.
pub async fn reload(State(state): State<Arc<ProxyState>>) -> Response {
    if !state.can_reload() {
        return (
            StatusCode::CONFLICT,
            "Configuration was not loaded from a reloadable source",
        )
            .into_response();
    }

    match state.reload().await {
        Ok(config) => Json(ReloadResponse {
            status: "reloaded",
            rules: config.virtual_projects(),
            upstreams: config.upstreams.clone(),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Configuration reload failed: {:#}", e);
            (StatusCode::BAD_REQUEST, format!("Reload failed: {:#}", e)).into_response()
        }
    }
}
