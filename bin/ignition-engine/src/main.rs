//! `ignition-engine`: wires the core crates to the control-plane and public
//! HTTP transports.

mod config;
mod control_plane;
mod http_error;
mod public_http;

use std::sync::Arc;

use clap::Parser;
use ignition_breaker::BreakerManager;
use ignition_function_core::{build::NullBuildService, executor::DEFAULT_TIMEOUT, FunctionManager, LogStore};
use ignition_plugin_manager::PluginManager;
use ignition_storage::{blob_root_under, registry_db_path, Registry};
use ignition_wasm_runtime::{Engine, WasmtimeEngine};
use tokio::net::UnixListener;

use crate::config::{init_logging, Cli, EngineConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = EngineConfig::load(cli)?;
    init_logging(&cfg.log_level);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cfg))
}

async fn run(cfg: EngineConfig) -> anyhow::Result<()> {
    tracing::info!(socket = %cfg.socket.display(), http_addr = %cfg.http_addr, "starting ignition-engine");

    std::fs::create_dir_all(&cfg.registry_root)?;
    if let Some(parent) = cfg.socket.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&cfg.socket);

    let store = Arc::new(ignition_storage::RocksStore::open(registry_db_path(&cfg.registry_root))?);
    let registry = Registry::new(store, blob_root_under(&cfg.registry_root));

    let plugins = PluginManager::new();
    plugins.start_cleanup();
    let breakers = BreakerManager::new();
    let engine: Arc<dyn Engine> = Arc::new(WasmtimeEngine::new()?);
    let logs = Arc::new(LogStore::default());

    let manager = Arc::new(FunctionManager::new(
        plugins.clone(),
        breakers,
        registry,
        engine,
        Arc::new(NullBuildService),
        logs,
        DEFAULT_TIMEOUT,
    ));

    let control_listener = UnixListener::bind(&cfg.socket)?;
    let control_router = control_plane::router(manager.clone());
    let control_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(control_listener, control_router).await {
            tracing::error!(error = %e, "control-plane listener exited");
        }
    });

    let http_listener = tokio::net::TcpListener::bind(cfg.http_addr).await?;
    let public_router = public_http::router(manager.clone());
    let public_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, public_router).await {
            tracing::error!(error = %e, "public HTTP listener exited");
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    control_task.abort();
    public_task.abort();
    manager.shutdown().await;
    let _ = std::fs::remove_file(&cfg.socket);

    Ok(())
}
