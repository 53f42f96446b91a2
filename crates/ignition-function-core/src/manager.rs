//! The Function Manager facade: composes Loader, Executor, Registry,
//! and the build service into the outward contract used by the transport
//! layer, including the auto-reload retry policy.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ignition_breaker::BreakerManager;
use ignition_plugin_manager::PluginManager;
use ignition_services::cancel::CallContext;
use ignition_storage::Registry;
use ignition_types::{Config, Domain, Error, FunctionKey, Result};
use ignition_wasm_runtime::Engine;

use crate::build::BuildService;
use crate::executor::Executor;
use crate::loader::Loader;
use crate::logs::LogStore;

/// The aggregated read exposed by `get_state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionState {
    pub loaded: bool,
    pub stopped: bool,
    pub previously_loaded: bool,
    pub config: Option<Config>,
    pub digest: Option<String>,
    pub tags: BTreeSet<String>,
    pub breaker_open: bool,
    pub running: bool,
}

/// The result of a successful `build` (the `/build` response shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub digest: String,
    pub tag: String,
    pub build_time: Duration,
}

#[derive(Clone)]
pub struct FunctionManager {
    loader: Loader,
    executor: Executor,
    registry: Registry,
    plugins: PluginManager,
    breakers: BreakerManager,
    build_service: Arc<dyn BuildService>,
    logs: Arc<LogStore>,
}

impl FunctionManager {
    pub fn new(
        plugins: PluginManager,
        breakers: BreakerManager,
        registry: Registry,
        engine: Arc<dyn Engine>,
        build_service: Arc<dyn BuildService>,
        logs: Arc<LogStore>,
        default_timeout: Duration,
    ) -> Self {
        let loader = Loader::new(plugins.clone(), breakers.clone(), registry.clone(), engine, logs.clone());
        let executor = Executor::with_default_timeout(plugins.clone(), breakers.clone(), logs.clone(), default_timeout);
        Self {
            loader,
            executor,
            registry,
            plugins,
            breakers,
            build_service,
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
        self.loader.load(ctx, key, reference, config, force).await
    }

    pub fn unload(&self, key: &FunctionKey) -> Result<()> {
        self.loader.unload(key)
    }

    pub fn stop(&self, key: &FunctionKey) -> Result<()> {
        self.loader.stop(key)
    }

    pub fn reassign_tag(&self, key: &FunctionKey, tag: &str, new_digest: &str) -> Result<()> {
        self.registry.reassign_tag(key, tag, new_digest)
    }

    /// `call`, with the manager's auto-reload policy layered on top: on
    /// `not_loaded`, rehydrate from the last remembered config and retry
    /// exactly once.
    pub async fn call(
        &self,
        ctx: &CallContext,
        key: &FunctionKey,
        entrypoint: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        match self.executor.call(ctx, key, entrypoint, payload).await {
            Err(e) if e.is(Domain::Function, "not_loaded") => {
                self.auto_reload(ctx, key).await?;
                self.executor.call(ctx, key, entrypoint, payload).await
            }
            other => other,
        }
    }

    /// Performs the reconciliation steps of auto-reload only. The retry call
    /// itself is issued by the caller (`call`), not here, so a failed reload
    /// never silently retries the call.
    async fn auto_reload(&self, ctx: &CallContext, key: &FunctionKey) -> Result<()> {
        let key_str = key.as_storage_key();

        if self.plugins.is_stopped(&key_str) {
            return Err(Error::not_found_or_stopped(format!("{key} is stopped")));
        }
        if !self.plugins.was_previously_loaded(&key_str) {
            return Err(Error::not_loaded(format!("{key} was never loaded")));
        }

        let metadata = self
            .registry
            .get(key)
            .map_err(|_| Error::function_not_found(format!("no metadata for {key}")))?;
        let version = metadata
            .preferred_reload_version()
            .ok_or_else(|| Error::function_not_found(format!("{key} has no versions")))?;
        let reference = version.full_digest.clone();

        let config = self.plugins.get_config(&key_str).unwrap_or_default();
        self.loader.load(ctx, key, &reference, config, false).await
    }

    pub fn get_state(&self, key: &FunctionKey) -> FunctionState {
        let key_str = key.as_storage_key();
        let loaded = self.plugins.is_loaded(&key_str);
        let stopped = self.plugins.is_stopped(&key_str);
        let digest = self.plugins.get_digest(&key_str);
        let breaker_open = self.breakers.get(&key_str).is_open();

        let tags = digest
            .as_deref()
            .and_then(|digest| self.registry.get(key).ok().map(|metadata| (digest.to_string(), metadata)))
            .and_then(|(digest, metadata)| metadata.version_by_full_digest(&digest).map(|v| v.tags.clone()))
            .unwrap_or_default();

        FunctionState {
            loaded,
            stopped,
            previously_loaded: self.plugins.was_previously_loaded(&key_str),
            config: self.plugins.get_config(&key_str),
            digest,
            tags,
            breaker_open,
            running: loaded && !breaker_open,
        }
    }

    /// Delegates to the configured `BuildService`, then pushes the resulting
    /// bytes to the registry. `ns` defaults to `"default"`, `name` to the
    /// basename of `path`, `tag` to the digest when empty.
    pub fn build(
        &self,
        ns: Option<&str>,
        name: Option<&str>,
        path: &str,
        tag: Option<&str>,
        manifest: &str,
    ) -> Result<BuildOutcome> {
        let ns = ns.filter(|s| !s.is_empty()).unwrap_or("default").to_string();
        let name = match name.filter(|s| !s.is_empty()) {
            Some(name) => name.to_string(),
            None => Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::invalid(format!("cannot derive a function name from '{path}'")))?,
        };
        let key = FunctionKey::new(ns, name)
            .map_err(|e| Error::invalid(e.to_string()))?;

        let started = std::time::Instant::now();
        let (bytes, digest) = self.build_service.build(path, manifest)?;
        let build_time = started.elapsed();

        let tag = tag.filter(|s| !s.is_empty()).unwrap_or(digest.as_str()).to_string();
        self.registry
            .push(&key, &bytes, &digest, Some(&tag), Default::default())?;

        Ok(BuildOutcome {
            digest,
            tag,
            build_time,
        })
    }

    pub fn list_loaded(&self) -> Vec<String> {
        self.plugins.list_loaded()
    }

    pub fn count_loaded(&self) -> usize {
        self.plugins.count_loaded()
    }

    pub fn logs(&self, key: &FunctionKey, since_seconds: Option<i64>, tail: Option<usize>) -> Vec<String> {
        self.logs.get(&key.as_storage_key(), since_seconds, tail)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub async fn shutdown(&self) {
        self.plugins.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::NullBuildService;
    use ignition_storage::InMemoryStore;
    use ignition_types::Settings;
    use ignition_wasm_runtime::mock::{MockBehavior, MockEngine};
    use tokio_util::sync::CancellationToken;

    fn manager() -> (FunctionManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let registry = Registry::new(store, dir.path());
        let engine: Arc<dyn Engine> = Arc::new(MockEngine::new(vec![("echo", MockBehavior::Echo)]));
        let manager = FunctionManager::new(
            PluginManager::new(),
            BreakerManager::new(),
            registry,
            engine,
            Arc::new(NullBuildService),
            Arc::new(LogStore::default()),
            Duration::from_secs(5),
        );
        (manager, dir)
    }

    fn ctx() -> CallContext {
        CallContext::new(CancellationToken::new(), None)
    }

    #[tokio::test]
    async fn scenario_load_call_unload() {
        let (manager, _dir) = manager();
        let key = FunctionKey::new("ns1", "f").unwrap();
        manager
            .registry
            .push(&key, b"", "aaaaaaaaaaaabbbb", Some("latest"), Settings::default())
            .unwrap();

        manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();
        let output = manager.call(&ctx(), &key, "echo", &[1, 2]).await.unwrap();
        assert_eq!(output, vec![1, 2]);

        manager.unload(&key).unwrap();
        let err = manager.call(&ctx(), &key, "echo", &[1, 2]).await.unwrap_err();
        assert!(err.is(Domain::Function, "not_loaded"));
        assert!(manager.get_state(&key).previously_loaded);
    }

    #[tokio::test]
    async fn auto_reload_rehydrates_evicted_function_and_retries_call() {
        let (manager, _dir) = manager();
        let key = FunctionKey::new("ns1", "f").unwrap();
        manager
            .registry
            .push(&key, b"", "aaaaaaaaaaaabbbb", Some("latest"), Settings::default())
            .unwrap();
        manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();
        manager.plugins.remove(&key.as_storage_key());

        let output = manager.call(&ctx(), &key, "echo", &[9]).await.unwrap();
        assert_eq!(output, vec![9]);
        assert!(manager.get_state(&key).loaded);
    }

    #[tokio::test]
    async fn stop_blocks_auto_reload_with_not_found_or_stopped() {
        let (manager, _dir) = manager();
        let key = FunctionKey::new("ns1", "f").unwrap();
        manager
            .registry
            .push(&key, b"", "aaaaaaaaaaaabbbb", Some("latest"), Settings::default())
            .unwrap();
        manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();
        manager.stop(&key).unwrap();

        let err = manager.call(&ctx(), &key, "echo", &[]).await.unwrap_err();
        assert!(err.is(Domain::Function, "not_found_or_stopped"));
    }
}
