use std::sync::OnceLock;

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;

use crate::global_registry;

/// The engine's runtime metrics: how many functions are loaded right now,
/// how often breakers trip, how long calls take, and how many instances the
/// TTL-eviction worker has reclaimed.
pub struct PluginMetrics {
    pub loaded_functions: Gauge,
    pub breaker_opened_total: Counter,
    pub breaker_closed_total: Counter,
    pub call_latency_seconds: Histogram,
    pub evicted_total: Counter,
}

impl Default for PluginMetrics {
    fn default() -> Self {
        let call_latency_seconds = Histogram::new(
            vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0].into_iter(),
        );

        let metrics = PluginMetrics {
            loaded_functions: Gauge::default(),
            breaker_opened_total: Counter::default(),
            breaker_closed_total: Counter::default(),
            call_latency_seconds,
            evicted_total: Counter::default(),
        };

        let mut registry = global_registry().registry.lock();
        registry.register(
            "ignition_loaded_functions",
            "Number of functions with a live Wasm instance cached",
            metrics.loaded_functions.clone(),
        );
        registry.register(
            "ignition_breaker_opened_total",
            "Total number of circuit breaker open transitions",
            metrics.breaker_opened_total.clone(),
        );
        registry.register(
            "ignition_breaker_closed_total",
            "Total number of circuit breaker close transitions",
            metrics.breaker_closed_total.clone(),
        );
        registry.register(
            "ignition_call_latency_seconds",
            "Function call latency in seconds",
            metrics.call_latency_seconds.clone(),
        );
        registry.register(
            "ignition_evicted_total",
            "Total number of instances closed by TTL eviction",
            metrics.evicted_total.clone(),
        );

        metrics
    }
}

static PLUGIN_METRICS: OnceLock<PluginMetrics> = OnceLock::new();

pub fn plugin_metrics() -> &'static PluginMetrics {
    PLUGIN_METRICS.get_or_init(PluginMetrics::default)
}
