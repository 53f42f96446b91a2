//! Process-global Prometheus registry and the engine's metric families: one
//! `OnceLock`-backed singleton per metric group, registered against a shared
//! `prometheus_client::registry::Registry` behind a `parking_lot::Mutex`.

pub mod plugin_metrics;

use std::sync::OnceLock;

use parking_lot::Mutex;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;

pub use plugin_metrics::{plugin_metrics, PluginMetrics};

pub struct GlobalRegistry {
    pub registry: Mutex<Registry>,
}

static GLOBAL_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

pub fn global_registry() -> &'static GlobalRegistry {
    GLOBAL_REGISTRY.get_or_init(|| GlobalRegistry {
        registry: Mutex::new(Registry::default()),
    })
}

/// Renders every registered metric in the Prometheus text exposition format,
/// for a `/metrics` route.
pub fn encode_metrics() -> Result<String, std::fmt::Error> {
    let mut buffer = String::new();
    encode(&mut buffer, &global_registry().registry.lock())?;
    Ok(buffer)
}
