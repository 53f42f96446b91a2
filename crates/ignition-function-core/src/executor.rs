//! The Function Executor: the request path. Gates on the circuit
//! breaker, invokes the cached instance with a bounded timeout on a
//! detached worker, and records the outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ignition_breaker::BreakerManager;
use ignition_plugin_manager::PluginManager;
use ignition_services::cancel::CallContext;
use ignition_types::{Error, FunctionKey, Result};

use crate::cancel_ext::blocking_cancellable;
use crate::logs::{LogLevel, LogStore};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct Executor {
    plugins: PluginManager,
    breakers: BreakerManager,
    logs: Arc<LogStore>,
    default_timeout: Duration,
}

impl Executor {
    pub fn new(plugins: PluginManager, breakers: BreakerManager, logs: Arc<LogStore>) -> Self {
        Self::with_default_timeout(plugins, breakers, logs, DEFAULT_TIMEOUT)
    }

    pub fn with_default_timeout(
        plugins: PluginManager,
        breakers: BreakerManager,
        logs: Arc<LogStore>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            plugins,
            breakers,
            logs,
            default_timeout,
        }
    }

    pub async fn call(
        &self,
        ctx: &CallContext,
        key: &FunctionKey,
        entrypoint: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let key_str = key.as_storage_key();
        self.logs.push(
            &key_str,
            LogLevel::Info,
            format!("Function call: {entrypoint} with payload size {}", payload.len()),
        );

        let breaker = self.breakers.get(&key_str);
        if breaker.is_open() {
            return Err(Error::circuit_breaker_open(format!("{key} breaker is open")));
        }

        let Some(instance) = self.plugins.get(&key_str) else {
            return Err(Error::not_loaded(format!("{key} has no cached instance")));
        };

        let effective_ctx = if ctx.deadline.is_none() {
            CallContext::new(ctx.cancel.clone(), Some(self.default_timeout))
        } else {
            ctx.clone()
        };

        let entry = entrypoint.to_string();
        let payload_owned = payload.to_vec();
        let started = Instant::now();
        let was_half_open = breaker.state() == ignition_breaker::BreakerState::HalfOpen;

        let outcome = blocking_cancellable(&effective_ctx, move || {
            instance
                .call(&entry, &payload_owned)
                .map_err(|e| Error::call_failed(e.to_string()))
        })
        .await;

        let metrics = ignition_metrics::plugin_metrics();
        metrics.call_latency_seconds.observe(started.elapsed().as_secs_f64());

        match outcome {
            Ok((0, output)) => {
                breaker.record_success();
                if was_half_open {
                    metrics.breaker_closed_total.inc();
                }
                self.logs.push(
                    &key_str,
                    LogLevel::Info,
                    format!(
                        "call completed in {:?}, output size {}",
                        started.elapsed(),
                        output.len()
                    ),
                );
                Ok(output)
            }
            Ok((code, _)) => {
                let opened = breaker.record_failure();
                if opened {
                    metrics.breaker_opened_total.inc();
                    self.logs.push(&key_str, LogLevel::Warn, "Circuit breaker opened");
                }
                Err(Error::call_failed(format!("entrypoint returned status code {code}")))
            }
            Err(e) if e.is(ignition_types::Domain::Execution, "timeout") => {
                if breaker.record_failure() {
                    metrics.breaker_opened_total.inc();
                }
                self.logs.push(
                    &key_str,
                    LogLevel::Warn,
                    format!("execution timed out after {:?}", effective_ctx.deadline),
                );
                Err(e)
            }
            Err(e) if e.is(ignition_types::Domain::Execution, "cancelled") => {
                if breaker.record_failure() {
                    metrics.breaker_opened_total.inc();
                }
                self.logs.push(&key_str, LogLevel::Warn, "execution was cancelled");
                Err(e)
            }
            Err(e) => {
                let opened = breaker.record_failure();
                if opened {
                    metrics.breaker_opened_total.inc();
                    self.logs.push(&key_str, LogLevel::Warn, "Circuit breaker opened");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ignition_types::Config;
    use ignition_wasm_runtime::mock::{MockBehavior, MockEngine};
    use ignition_wasm_runtime::Engine;
    use tokio_util::sync::CancellationToken;

    fn executor_with(
        behaviors: Vec<(&str, MockBehavior)>,
        timeout: Duration,
    ) -> (Executor, PluginManager, FunctionKey) {
        let plugins = PluginManager::new();
        let breakers = BreakerManager::new();
        let key = FunctionKey::new("ns1", "f").unwrap();
        let engine = MockEngine::new(behaviors);
        let instance = engine
            .instantiate(b"", &Default::default(), &Config::new())
            .unwrap();
        plugins.store(&key.as_storage_key(), instance, "d1".into(), Config::new());
        let executor = Executor::with_default_timeout(
            plugins.clone(),
            breakers,
            Arc::new(LogStore::default()),
            timeout,
        );
        (executor, plugins, key)
    }

    fn ctx() -> CallContext {
        CallContext::new(CancellationToken::new(), None)
    }

    #[tokio::test]
    async fn echo_call_returns_payload_and_records_success() {
        let (executor, _plugins, key) = executor_with(vec![("echo", MockBehavior::Echo)], Duration::from_secs(1));
        let output = executor.call(&ctx(), &key, "echo", &[1, 2, 3]).await.unwrap();
        assert_eq!(output, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn not_loaded_when_no_instance_cached() {
        let plugins = PluginManager::new();
        let executor = Executor::new(plugins, BreakerManager::new(), Arc::new(LogStore::default()));
        let key = FunctionKey::new("ns1", "f").unwrap();
        let err = executor.call(&ctx(), &key, "echo", &[]).await.unwrap_err();
        assert!(err.is(ignition_types::Domain::Function, "not_loaded"));
    }

    #[tokio::test]
    async fn circuit_opens_after_five_failures_and_gates_sixth_call() {
        let (executor, _plugins, key) = executor_with(vec![("bad", MockBehavior::Fail)], Duration::from_secs(1));
        for _ in 0..5 {
            let err = executor.call(&ctx(), &key, "bad", &[]).await.unwrap_err();
            assert!(err.is(ignition_types::Domain::Execution, "failed"));
        }
        let err = executor.call(&ctx(), &key, "bad", &[]).await.unwrap_err();
        assert!(err.is(ignition_types::Domain::Execution, "circuit_breaker_open"));
    }

    #[tokio::test]
    async fn slow_call_times_out_and_counts_as_a_failure() {
        let (executor, _plugins, key) =
            executor_with(vec![("sleep", MockBehavior::Sleep(Duration::from_secs(5)))], Duration::from_millis(50));
        let err = executor.call(&ctx(), &key, "sleep", &[]).await.unwrap_err();
        assert!(err.is(ignition_types::Domain::Execution, "timeout"));
    }
}
