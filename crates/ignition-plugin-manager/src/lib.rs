//! The Plugin Manager: a concurrent map from function key to
//! `{instance, last_used, digest, config, previously_loaded, stopped}`.
//! Only this crate holds Wasm instance handles; only it may close them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use ignition_services::{RunnableService, Service, ServiceRunner, Shared};
use ignition_types::Config;
use ignition_wasm_runtime::Instance;
use parking_lot::Mutex as SyncMutex;

pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

struct Entry {
    instance: Option<Arc<dyn Instance>>,
    last_used: Option<Instant>,
    digest: Option<String>,
    config: Option<Config>,
    previously_loaded: bool,
    stopped: bool,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            instance: None,
            last_used: None,
            digest: None,
            config: None,
            previously_loaded: false,
            stopped: false,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: DashMap<String, Entry>,
}

/// The concurrent instance cache. Cheap to clone (an `Arc` around the shared
/// maps), so callers can hand a `PluginManager` to both the Loader and the
/// Executor without wrapping it themselves.
#[derive(Clone)]
pub struct PluginManager {
    inner: Arc<Inner>,
    ttl: Duration,
    cleanup_interval: Duration,
    cleanup: Arc<SyncMutex<Option<ServiceRunner<EvictionWorker>>>>,
}

impl PluginManager {
    pub fn new() -> Self {
        Self::with_settings(DEFAULT_TTL, DEFAULT_CLEANUP_INTERVAL)
    }

    pub fn with_settings(ttl: Duration, cleanup_interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            ttl,
            cleanup_interval,
            cleanup: Arc::new(SyncMutex::new(None)),
        }
    }

    /// On hit, refreshes `last_used` to now.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Instance>> {
        let mut entry = self.inner.entries.get_mut(key)?;
        let instance = entry.instance.clone()?;
        entry.last_used = Some(Instant::now());
        Some(instance)
    }

    /// Closes any prior instance first, then records the new one. Sets
    /// `previously_loaded` and initializes `last_used`.
    pub fn store(&self, key: &str, instance: Box<dyn Instance>, digest: String, config: Config) {
        let mut entry = self.inner.entries.entry(key.to_string()).or_default();
        if let Some(old) = entry.instance.take() {
            old.close();
        }
        entry.instance = Some(Arc::from(instance));
        entry.digest = Some(digest);
        entry.config = Some(config);
        entry.previously_loaded = true;
        entry.last_used = Some(Instant::now());
        drop(entry);
        ignition_metrics::plugin_metrics()
            .loaded_functions
            .set(self.count_loaded() as i64);
    }

    /// Closes and drops the instance; digest/config/previously_loaded are
    /// retained so a later call can auto-reload. Returns whether an instance
    /// was actually present.
    pub fn remove(&self, key: &str) -> bool {
        let closed = {
            let Some(mut entry) = self.inner.entries.get_mut(key) else {
                return false;
            };
            match entry.instance.take() {
                Some(old) => {
                    old.close();
                    true
                }
                None => false,
            }
        };
        if closed {
            ignition_metrics::plugin_metrics()
                .loaded_functions
                .set(self.count_loaded() as i64);
        }
        closed
    }

    /// Equivalent to `remove`, additionally sets `stopped`.
    pub fn stop(&self, key: &str) -> bool {
        let closed = {
            let mut entry = self.inner.entries.entry(key.to_string()).or_default();
            let closed = match entry.instance.take() {
                Some(old) => {
                    old.close();
                    true
                }
                None => false,
            };
            entry.stopped = true;
            closed
        };
        if closed {
            ignition_metrics::plugin_metrics()
                .loaded_functions
                .set(self.count_loaded() as i64);
        }
        closed
    }

    pub fn clear_stopped(&self, key: &str) {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            entry.stopped = false;
        }
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.inner
            .entries
            .get(key)
            .map(|e| e.instance.is_some())
            .unwrap_or(false)
    }

    pub fn was_previously_loaded(&self, key: &str) -> bool {
        self.inner
            .entries
            .get(key)
            .map(|e| e.previously_loaded)
            .unwrap_or(false)
    }

    pub fn is_stopped(&self, key: &str) -> bool {
        self.inner
            .entries
            .get(key)
            .map(|e| e.stopped)
            .unwrap_or(false)
    }

    pub fn get_digest(&self, key: &str) -> Option<String> {
        self.inner.entries.get(key).and_then(|e| e.digest.clone())
    }

    /// Returns a defensive copy of the stored config.
    pub fn get_config(&self, key: &str) -> Option<Config> {
        self.inner.entries.get(key).and_then(|e| e.config.clone())
    }

    pub fn has_config_changed(&self, key: &str, new_config: &Config) -> bool {
        match self.get_config(key) {
            None => true,
            Some(existing) => ignition_types::config::configs_differ(&existing, new_config),
        }
    }

    pub fn has_digest_changed(&self, key: &str, new_digest: &str) -> bool {
        match self.get_digest(key) {
            None => true,
            Some(existing) => existing != new_digest,
        }
    }

    pub fn list_loaded(&self) -> Vec<String> {
        self.inner
            .entries
            .iter()
            .filter(|e| e.instance.is_some())
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn count_loaded(&self) -> usize {
        self.inner
            .entries
            .iter()
            .filter(|e| e.instance.is_some())
            .count()
    }

    pub fn previously_loaded_set(&self) -> Vec<String> {
        self.inner
            .entries
            .iter()
            .filter(|e| e.previously_loaded)
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn stopped_set(&self) -> Vec<String> {
        self.inner
            .entries
            .iter()
            .filter(|e| e.stopped)
            .map(|e| e.key().clone())
            .collect()
    }

    /// Launches the TTL-eviction background worker.
    pub fn start_cleanup(&self) {
        let worker = EvictionWorker {
            manager: self.clone(),
        };
        let runner = ServiceRunner::new(worker);
        runner.start().expect("cleanup worker starts exactly once");
        *self.cleanup.lock() = Some(runner);
    }

    /// Stops the eviction worker (if running) and closes every remaining
    /// instance. Terminal: the manager is not meant to be reused afterward.
    pub async fn shutdown(&self) {
        if let Some(runner) = self.cleanup.lock().take() {
            let _ = runner.stop_and_await().await;
        }
        for mut entry in self.inner.entries.iter_mut() {
            if let Some(instance) = entry.instance.take() {
                instance.close();
            }
        }
    }

    /// One eviction pass: close and drop every instance whose `last_used` is
    /// older than `ttl`. Digest/config/previously_loaded survive so a later
    /// call can auto-reload; `stopped` is never cleared by eviction.
    fn evict_idle(&self) {
        let now = Instant::now();
        let mut evicted = Vec::new();
        for mut entry in self.inner.entries.iter_mut() {
            let idle = entry
                .last_used
                .map(|last| now.duration_since(last) > self.ttl)
                .unwrap_or(false);
            if idle {
                if let Some(instance) = entry.instance.take() {
                    instance.close();
                    evicted.push(entry.key().clone());
                }
            }
        }
        if !evicted.is_empty() {
            let metrics = ignition_metrics::plugin_metrics();
            metrics.evicted_total.inc_by(evicted.len() as u64);
            metrics.loaded_functions.set(self.count_loaded() as i64);
        }
        for key in evicted {
            tracing::info!(function = %key, "unloaded due to inactivity");
        }
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

struct EvictionWorker {
    manager: PluginManager,
}

#[async_trait::async_trait]
impl RunnableService for EvictionWorker {
    type SharedData = ();

    fn shared_data(&self) -> Shared<Self::SharedData> {
        Shared::new(())
    }

    async fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&mut self) -> anyhow::Result<bool> {
        tokio::time::sleep(self.manager.cleanup_interval).await;
        self.manager.evict_idle();
        Ok(true)
    }
}
