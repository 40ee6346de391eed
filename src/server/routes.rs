// src/server/routes.rs
//! Axum router configuration for the proxy
//!
//! Listings and admin responses are compressed; wheel downloads are not,
//! their bodies are already deflated.

use crate::server::ProxyState;
use crate::server::handlers::{admin, simple};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};

/// Create the main application router
pub fn create_router(state: Arc<ProxyState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let download_routes = Router::new()
        .route("/simple/:project/:filename", get(simple::download))
        .with_state(state.clone());

    let compressed_routes = Router::new()
        .route("/", get(simple::root))
        .route("/health", get(admin::health_check))
        .route("/simple/", get(simple::index))
        .route("/simple/:project", get(simple::project_without_slash))
        .route("/simple/:project/", get(simple::project))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/reload", post(admin::reload))
        .layer(CompressionLayer::new())
        .with_state(state);

    Router::new()
        .merge(download_routes)
        .merge(compressed_routes)
        .layer(cors)
}
