//! The public transport: `POST /{ns}/{name}/{entry}` invokes an
//! already-loaded function and returns its raw output bytes; `GET /health`
//! is a liveness probe independent of any function's state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ignition_function_core::FunctionManager;
use ignition_services::cancel::CallContext;
use ignition_types::FunctionKey;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::http_error::error_response;

pub fn router(manager: Arc<FunctionManager>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/:ns/:name/:entry", post(call))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(manager)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Deserialize)]
struct CallBody {
    payload: String,
}

async fn call(
    State(manager): State<Arc<FunctionManager>>,
    Path((ns, name, entry)): Path<(String, String, String)>,
    Json(body): Json<CallBody>,
) -> Response {
    let key = match FunctionKey::new(ns, name) {
        Ok(k) => k,
        Err(e) => return error_response(&ignition_types::Error::invalid(e.to_string())),
    };
    let ctx = CallContext::new(CancellationToken::new(), None);
    match manager.call(&ctx, &key, &entry, body.payload.as_bytes()).await {
        Ok(output) => output.into_response(),
        Err(e) => error_response(&e),
    }
}
