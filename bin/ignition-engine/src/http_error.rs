//! The domain/code → HTTP status mapping plus the shared
//! `{error, status, domain, code}` JSON error envelope both transports use.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ignition_types::{Domain, Error};
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
    domain: &'static str,
    code: &'static str,
}

/// Maps a core error to its HTTP status.
pub fn status_for(err: &Error) -> StatusCode {
    match (err.domain, err.code) {
        (Domain::Execution, "timeout") => StatusCode::GATEWAY_TIMEOUT,
        (Domain::Execution, "cancelled") => StatusCode::REQUEST_TIMEOUT,
        (Domain::Execution, "circuit_breaker_open") => StatusCode::SERVICE_UNAVAILABLE,
        (Domain::Execution, "failed") => StatusCode::INTERNAL_SERVER_ERROR,

        (Domain::Function, "not_loaded") => StatusCode::SERVICE_UNAVAILABLE,
        (Domain::Function, "stopped") => StatusCode::SERVICE_UNAVAILABLE,
        (Domain::Function, "not_found_or_stopped") => StatusCode::SERVICE_UNAVAILABLE,
        (Domain::Function, "not_found") => StatusCode::NOT_FOUND,
        (Domain::Function, "already_loaded") => StatusCode::CONFLICT,
        (Domain::Function, "invalid") | (Domain::Function, "invalid_config") => StatusCode::BAD_REQUEST,

        (Domain::Registry, "not_found") => StatusCode::NOT_FOUND,
        (Domain::Registry, "version_not_found") => StatusCode::NOT_FOUND,
        (Domain::Registry, "tag_not_found") => StatusCode::NOT_FOUND,
        (Domain::Registry, "invalid_reference") => StatusCode::BAD_REQUEST,
        (Domain::Registry, "error") => StatusCode::INTERNAL_SERVER_ERROR,

        (Domain::Plugin, "creation_failed") => StatusCode::INTERNAL_SERVER_ERROR,
        (Domain::Plugin, "not_found") => StatusCode::NOT_FOUND,
        (Domain::Plugin, "already_exists") => StatusCode::CONFLICT,

        (Domain::Engine, "not_initialized") => StatusCode::SERVICE_UNAVAILABLE,
        (Domain::Engine, "already_running") => StatusCode::CONFLICT,
        (Domain::Engine, "invalid_state") => StatusCode::CONFLICT,
        (Domain::Engine, "shutdown") => StatusCode::SERVICE_UNAVAILABLE,
        (Domain::Engine, "internal") => StatusCode::INTERNAL_SERVER_ERROR,

        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wraps a core error as a full `axum` response: status line plus the
/// `{error, status, domain, code}` JSON envelope.
pub fn error_response(err: &Error) -> Response {
    let status = status_for(err);
    let body = ErrorBody {
        error: err.message.clone(),
        status: status.as_u16(),
        domain: err.domain.as_str(),
        code: err.code,
    };
    (status, Json(body)).into_response()
}
