//! The Function Loader: the reconciliation path. Pulls an artifact,
//! compares it against the cached digest/config, closes a stale instance,
//! instantiates the new one, and stores it atomically.

use std::sync::Arc;

use ignition_breaker::BreakerManager;
use ignition_plugin_manager::PluginManager;
use ignition_services::cancel::CallContext;
use ignition_storage::Registry;
use ignition_types::{Config, Error, FunctionKey, Result};
use ignition_wasm_runtime::Engine;

use crate::cancel_ext::blocking_cancellable;
use crate::logs::{LogLevel, LogStore};

#[derive(Clone)]
pub struct Loader {
    plugins: PluginManager,
    breakers: BreakerManager,
    registry: Registry,
    engine: Arc<dyn Engine>,
    logs: Arc<LogStore>,
}

impl Loader {
    pub fn new(
        plugins: PluginManager,
        breakers: BreakerManager,
        registry: Registry,
        engine: Arc<dyn Engine>,
        logs: Arc<LogStore>,
    ) -> Self {
        Self {
            plugins,
            breakers,
            registry,
            engine,
            logs,
        }
    }

    pub async fn load(
        &self,
        ctx: &CallContext,
        key: &FunctionKey,
        reference: &str,
        config: Config,
        force: bool,
    ) -> Result<()> {
        let key_str = key.as_storage_key();

        if self.plugins.is_stopped(&key_str) && !force {
            return Err(Error::stopped(format!("{key} is stopped; load with force to resume")));
        }
        if force && self.plugins.is_stopped(&key_str) {
            self.plugins.clear_stopped(&key_str);
            self.logs.push(&key_str, LogLevel::Info, "cleared stopped state via force load");
        }

        let config_copy = config.clone();

        let registry = self.registry.clone();
        let pull_key = key.clone();
        let pull_reference = reference.to_string();
        let (bytes, version) = blocking_cancellable(ctx, move || registry.pull(&pull_key, &pull_reference)).await?;

        let new_digest = version.full_digest.clone();

        if self.plugins.is_loaded(&key_str) {
            let digest_changed = self.plugins.has_digest_changed(&key_str, &new_digest);
            let config_changed = self.plugins.has_config_changed(&key_str, &config_copy);
            if !digest_changed && !config_changed {
                self.logs.push(
                    &key_str,
                    LogLevel::Info,
                    "already loaded with same digest and config",
                );
                return Ok(());
            }
            self.logs.push(
                &key_str,
                LogLevel::Info,
                format!(
                    "reloading {key}: digest_changed={digest_changed} config_changed={config_changed}"
                ),
            );
            self.plugins.remove(&key_str);
            self.breakers.remove(&key_str);
        }

        let engine = self.engine.clone();
        let settings = version.settings.clone();
        let instantiate_config = config_copy.clone();
        let instance = blocking_cancellable(ctx, move || {
            engine
                .instantiate(&bytes, &settings, &instantiate_config)
                .map_err(|e| Error::creation_failed(e.to_string()))
        })
        .await
        .inspect_err(|e| {
            self.logs
                .push(&key_str, LogLevel::Error, format!("instantiate failed: {e}"));
        })?;

        self.plugins.store(&key_str, instance, new_digest, config_copy);
        Ok(())
    }

    /// No-op with an informational log if not loaded; otherwise closes and
    /// drops the instance and removes the breaker. Config and
    /// previously-loaded remain set.
    pub fn unload(&self, key: &FunctionKey) -> Result<()> {
        let key_str = key.as_storage_key();
        if !self.plugins.is_loaded(&key_str) {
            self.logs.push(&key_str, LogLevel::Info, "unload requested but not loaded");
            return Ok(());
        }
        self.plugins.remove(&key_str);
        self.breakers.remove(&key_str);
        self.logs.push(&key_str, LogLevel::Info, "unloaded");
        Ok(())
    }

    /// No-op if already stopped; otherwise removes the instance, sets
    /// `stopped`, and removes the breaker.
    pub fn stop(&self, key: &FunctionKey) -> Result<()> {
        let key_str = key.as_storage_key();
        if self.plugins.is_stopped(&key_str) {
            self.logs.push(&key_str, LogLevel::Info, "stop requested but already stopped");
            return Ok(());
        }
        self.plugins.stop(&key_str);
        self.breakers.remove(&key_str);
        self.logs.push(&key_str, LogLevel::Info, "stopped");
        Ok(())
    }
}
