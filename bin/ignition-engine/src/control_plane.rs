//! The control-plane router: every administrative endpoint, served over the
//! Unix domain socket. JSON in, JSON out, except `/call-once` which answers
//! with the raw output bytes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ignition_function_core::FunctionManager;
use ignition_services::cancel::CallContext;
use ignition_types::{Config, FunctionKey};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::http_error::error_response;

pub fn router(manager: Arc<FunctionManager>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/load", post(load))
        .route("/unload", post(unload))
        .route("/stop", post(stop))
        .route("/list", post(list))
        .route("/loaded", get(loaded))
        .route("/build", post(build))
        .route("/reassign-tag", post(reassign_tag))
        .route("/call-once", post(call_once))
        .route("/logs/:ns/:name", get(logs))
        .route("/metrics", get(metrics))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(manager)
}

fn key_from(namespace: &str, name: &str) -> Result<FunctionKey, Response> {
    FunctionKey::new(namespace, name)
        .map_err(|e| ignition_types::Error::invalid(e.to_string()))
        .map_err(|e| error_response(&e))
}

fn fresh_ctx() -> CallContext {
    CallContext::new(CancellationToken::new(), None)
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    loaded_functions: usize,
}

async fn status(State(manager): State<Arc<FunctionManager>>) -> Response {
    Json(StatusResponse {
        status: "ok",
        loaded_functions: manager.count_loaded(),
    })
    .into_response()
}

#[derive(Deserialize)]
struct LoadRequest {
    namespace: String,
    name: String,
    digest: String,
    #[serde(default)]
    config: Option<Config>,
    #[serde(default)]
    force_load: bool,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

async fn load(State(manager): State<Arc<FunctionManager>>, Json(req): Json<LoadRequest>) -> Response {
    let key = match key_from(&req.namespace, &req.name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let config = req.config.unwrap_or_default();
    match manager
        .load(&fresh_ctx(), &key, &req.digest, config, req.force_load)
        .await
    {
        Ok(()) => Json(MessageResponse {
            message: format!("{key} loaded"),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct KeyRequest {
    namespace: String,
    name: String,
}

async fn unload(State(manager): State<Arc<FunctionManager>>, Json(req): Json<KeyRequest>) -> Response {
    let key = match key_from(&req.namespace, &req.name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match manager.unload(&key) {
        Ok(()) => Json(MessageResponse {
            message: format!("{key} unloaded"),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn stop(State(manager): State<Arc<FunctionManager>>, Json(req): Json<KeyRequest>) -> Response {
    let key = match key_from(&req.namespace, &req.name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match manager.stop(&key) {
        Ok(()) => Json(MessageResponse {
            message: format!("{key} stopped"),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize, Default)]
struct ListRequest {
    namespace: Option<String>,
    name: Option<String>,
}

async fn list(State(manager): State<Arc<FunctionManager>>, Json(req): Json<ListRequest>) -> Response {
    let entries = match manager.registry().list_all_keyed() {
        Ok(entries) => entries,
        Err(e) => return error_response(&e),
    };

    match (req.namespace, req.name) {
        (Some(ns), Some(name)) => {
            let key = match key_from(&ns, &name) {
                Ok(k) => k,
                Err(resp) => return resp,
            };
            match entries.into_iter().find(|(k, _)| *k == key) {
                Some((_, metadata)) => Json(metadata).into_response(),
                None => error_response(&ignition_types::Error::function_not_found(format!("{key} not found"))),
            }
        }
        (Some(ns), None) => {
            let filtered: Vec<_> = entries
                .into_iter()
                .filter(|(k, _)| k.namespace() == ns)
                .map(|(_, m)| m)
                .collect();
            Json(filtered).into_response()
        }
        _ => {
            let all: Vec<_> = entries.into_iter().map(|(_, m)| m).collect();
            Json(all).into_response()
        }
    }
}

#[derive(Serialize)]
struct LoadedEntry {
    namespace: String,
    name: String,
    status: &'static str,
}

async fn loaded(State(manager): State<Arc<FunctionManager>>) -> Response {
    let entries = match manager.registry().list_all_keyed() {
        Ok(entries) => entries,
        Err(e) => return error_response(&e),
    };

    let result: Vec<_> = entries
        .into_iter()
        .map(|(key, _)| {
            let state = manager.get_state(&key);
            let status = if state.stopped {
                "stopped"
            } else if state.running {
                "running"
            } else {
                "unloaded"
            };
            LoadedEntry {
                namespace: key.namespace().to_string(),
                name: key.name().to_string(),
                status,
            }
        })
        .collect();
    Json(result).into_response()
}

#[derive(Deserialize)]
struct BuildRequest {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    name: Option<String>,
    path: String,
    #[serde(default)]
    tag: Option<String>,
    manifest: String,
}

#[derive(Serialize)]
struct BuildResponse {
    digest: String,
    tag: String,
    status: &'static str,
    build_time: u128,
}

async fn build(State(manager): State<Arc<FunctionManager>>, Json(req): Json<BuildRequest>) -> Response {
    match manager.build(
        req.namespace.as_deref(),
        req.name.as_deref(),
        &req.path,
        req.tag.as_deref(),
        &req.manifest,
    ) {
        Ok(outcome) => Json(BuildResponse {
            digest: outcome.digest,
            tag: outcome.tag,
            status: "ok",
            build_time: outcome.build_time.as_millis(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct ReassignTagRequest {
    namespace: String,
    name: String,
    tag: String,
    digest: String,
}

async fn reassign_tag(State(manager): State<Arc<FunctionManager>>, Json(req): Json<ReassignTagRequest>) -> Response {
    let key = match key_from(&req.namespace, &req.name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match manager.reassign_tag(&key, &req.tag, &req.digest) {
        Ok(()) => Json(MessageResponse {
            message: format!("{key}: {} -> {}", req.tag, req.digest),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct CallOnceRequest {
    namespace: String,
    name: String,
    reference: String,
    entrypoint: String,
    payload: Vec<u8>,
    #[serde(default)]
    config: Option<Config>,
}

async fn call_once(State(manager): State<Arc<FunctionManager>>, Json(req): Json<CallOnceRequest>) -> Response {
    let key = match key_from(&req.namespace, &req.name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let config = req.config.unwrap_or_default();
    let ctx = fresh_ctx();

    if let Err(e) = manager.load(&ctx, &key, &req.reference, config, false).await {
        return error_response(&e);
    }
    match manager.call(&ctx, &key, &req.entrypoint, &req.payload).await {
        Ok(output) => output.into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct LogsQuery {
    since: Option<i64>,
    tail: Option<usize>,
}

async fn logs(
    State(manager): State<Arc<FunctionManager>>,
    Path((ns, name)): Path<(String, String)>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let key = match key_from(&ns, &name) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    Json(manager.logs(&key, query.since, query.tail)).into_response()
}

/// Prometheus scrape endpoint. Additive: absent or failing, every other
/// route is unaffected.
async fn metrics() -> Response {
    match ignition_metrics::encode_metrics() {
        Ok(body) => ([("content-type", "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

