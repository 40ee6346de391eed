// src/server/handlers/simple.rs
//! Simple repository API endpoints

use super::error_response;
use crate::server::ProxyState;
use crate::server::html::{ListingFormat, render_project, render_root};
use crate::server::transform::{Download, Transform};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;

/// `?format=json|html` override for content negotiation
#[derive(Debug, Default, Deserialize)]
pub struct FormatQuery {
    pub format: Option<String>,
}

fn negotiate(headers: &HeaderMap, query: &FormatQuery) -> ListingFormat {
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    ListingFormat::negotiate(accept, query.format.as_deref())
}

fn listing_response(format: ListingFormat, body: String) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type()),
            (header::VARY, "Accept"),
        ],
        body,
    )
        .into_response()
}

/// GET /
pub async fn root() -> Redirect {
    Redirect::temporary("/simple/")
}

/// GET /simple/
///
/// Lists the renamed projects only; other projects are reachable by name.
pub async fn index(
    State(state): State<Arc<ProxyState>>,
    headers: HeaderMap,
    Query(query): Query<FormatQuery>,
) -> Response {
    let snapshot = state.snapshot().await;
    let transform = Transform {
        config: &snapshot.config,
        source: snapshot.source.as_ref(),
        cache: &state.cache,
        metrics: &state.metrics,
    };

    let format = negotiate(&headers, &query);
    state.metrics.record_listing();
    listing_response(format, render_root(format, &transform.list_projects()))
}

/// GET /simple/:project
pub async fn project_without_slash(Path(project): Path<String>) -> Redirect {
    Redirect::permanent(&format!("/simple/{}/", project))
}

/// GET /simple/:project/
pub async fn project(
    State(state): State<Arc<ProxyState>>,
    Path(project): Path<String>,
    headers: HeaderMap,
    Query(query): Query<FormatQuery>,
) -> Response {
    let snapshot = state.snapshot().await;
    let transform = Transform {
        config: &snapshot.config,
        source: snapshot.source.as_ref(),
        cache: &state.cache,
        metrics: &state.metrics,
    };

    match transform.list_artifacts(&project).await {
        Ok(listing) => {
            let format = negotiate(&headers, &query);
            state.metrics.record_listing();
            listing_response(format, render_project(format, &listing))
        }
        Err(e) => error_response(&format!("Listing {}", project), &e),
    }
}

/// GET /simple/:project/:filename
///
/// Renamed projects get the renamed wheel; others are redirected upstream.
pub async fn download(
    State(state): State<Arc<ProxyState>>,
    Path((project, filename)): Path<(String, String)>,
) -> Response {
    let snapshot = state.snapshot().await;
    let transform = Transform {
        config: &snapshot.config,
        source: snapshot.source.as_ref(),
        cache: &state.cache,
        metrics: &state.metrics,
    };

    match transform.fetch_artifact(&project, &filename).await {
        Ok(Download::Redirect(url)) => {
            state.metrics.record_redirect();
            (StatusCode::FOUND, [(header::LOCATION, url)]).into_response()
        }
        Ok(Download::Renamed {
            filename,
            bytes,
            warnings,
            cached,
        }) => {
            state.metrics.record_bytes_served(bytes.len() as u64);
            let body = Body::from(bytes);
            let disposition = format!("attachment; filename=\"{}\"", filename);

            let built = Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .header(header::CONTENT_DISPOSITION, disposition)
                .header("x-rename-warnings", warnings.len().to_string())
                .header("x-rename-cache", if cached { "hit" } else { "miss" })
                .body(body);
            match built {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Failed to build response for {}: {}", filename, e);
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Err(e) => error_response(&format!("Download {}/{}", project, filename), &e),
    }
}
