//! A scriptable [`Engine`]/[`Instance`] pair for tests, so the core crates
//! can exercise load/call/breaker/timeout behavior without a real `.wasm`
//! binary or a calling convention. Each entrypoint name maps to a canned
//! behavior, matching the `"echo"`/`"bad"`/`"sleep"` entries used in the
//! end-to-end scenario tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ignition_types::{Config, Settings};

use crate::engine::{Engine, Instance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Echoes the payload back as output with status code 0.
    Echo,
    /// Always fails the call with a non-nil error.
    Fail,
    /// Sleeps `duration` before echoing the payload back.
    Sleep(Duration),
}

pub struct MockEngine {
    pub behaviors: Vec<(String, MockBehavior)>,
    pub instantiate_calls: std::sync::Arc<AtomicUsize>,
}

impl MockEngine {
    pub fn new(behaviors: Vec<(&str, MockBehavior)>) -> Self {
        Self {
            behaviors: behaviors
                .into_iter()
                .map(|(name, behavior)| (name.to_string(), behavior))
                .collect(),
            instantiate_calls: std::sync::Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn instantiate_count(&self) -> usize {
        self.instantiate_calls.load(Ordering::SeqCst)
    }
}

impl Engine for MockEngine {
    fn instantiate(
        &self,
        _bytes: &[u8],
        _settings: &Settings,
        _config: &Config,
    ) -> anyhow::Result<Box<dyn Instance>> {
        self.instantiate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockInstance {
            behaviors: self.behaviors.clone(),
        }))
    }
}

struct MockInstance {
    behaviors: Vec<(String, MockBehavior)>,
}

impl Instance for MockInstance {
    fn call(&self, entrypoint: &str, payload: &[u8]) -> anyhow::Result<(i32, Vec<u8>)> {
        let behavior = self
            .behaviors
            .iter()
            .find(|(name, _)| name == entrypoint)
            .map(|(_, behavior)| *behavior)
            .ok_or_else(|| anyhow::anyhow!("unknown entrypoint '{entrypoint}'"))?;

        match behavior {
            MockBehavior::Echo => Ok((0, payload.to_vec())),
            MockBehavior::Fail => Err(anyhow::anyhow!("entrypoint '{entrypoint}' failed")),
            MockBehavior::Sleep(duration) => {
                std::thread::sleep(duration);
                Ok((0, payload.to_vec()))
            }
        }
    }

    fn close(&self) {}
}
