// src/server/handlers/mod.rs
//! HTTP request handlers for the proxy

pub mod admin;
pub mod simple;

use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Status code for a failed request
///
/// Archive errors on this path come from upstream bytes, so they are
/// reported as a bad gateway.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::NotFound(_) | Error::InvalidWheelFilename(_) => StatusCode::NOT_FOUND,
        Error::Upstream(_)
        | Error::CorruptArchive { .. }
        | Error::MissingNameField { .. }
        | Error::RenameConflict { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a failed request and turn it into a plain-text response
pub fn error_response(context: &str, err: &Error) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!("{}: {}", context, err);
    } else {
        tracing::debug!("{}: {}", context, err);
    }
    (status, err.to_string()).into_response()
}
