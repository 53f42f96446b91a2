//! Per-function circuit breakers: `closed` (normal), `open`
//! (fast-fail), `half_open` (probe), plus the manager that lazily creates
//! one breaker per function key.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

/// A single function key's circuit breaker.
#[derive(Debug)]
pub struct Breaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl Breaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                last_failure: None,
            }),
            failure_threshold,
            reset_timeout,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_RESET_TIMEOUT)
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// `half_open` -> `closed`, failures reset to 0. No effect in `closed`.
    /// `open` is left untouched: a success can only come from a probe call,
    /// and a probe call only happens after `is_open` has already flipped the
    /// state to `half_open`.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
        }
    }

    /// Increments the failure count and, depending on the current state,
    /// transitions to `open`. Returns whether the breaker is `open` after
    /// this call.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::Closed => {
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                }
            }
            BreakerState::HalfOpen => inner.state = BreakerState::Open,
            BreakerState::Open => {}
        }
        inner.state == BreakerState::Open
    }

    /// Returns whether execution should be gated. As a side effect, an
    /// `open` breaker whose reset timeout has elapsed transitions to
    /// `half_open` and permits exactly one probe (returns `false`).
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != BreakerState::Open {
            return false;
        }
        let elapsed_past_reset = inner
            .last_failure
            .map(|last| last.elapsed() > self.reset_timeout)
            .unwrap_or(false);
        if elapsed_past_reset {
            inner.state = BreakerState::HalfOpen;
            return false;
        }
        true
    }
}

impl Default for Breaker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Lazily creates and tracks one [`Breaker`] per function key. Cheap to
/// clone: an `Arc` around the shared map, so the Loader, Executor, and
/// Manager facade all observe the same breakers.
#[derive(Debug, Clone)]
pub struct BreakerManager {
    breakers: Arc<DashMap<String, Arc<Breaker>>>,
}

impl Default for BreakerManager {
    fn default() -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
        }
    }
}

impl BreakerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the breaker for `key`, creating it with default parameters on
    /// first access. Concurrent first-access calls converge on one instance.
    pub fn get(&self, key: &str) -> Arc<Breaker> {
        self.breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Breaker::with_defaults()))
            .clone()
    }

    pub fn remove(&self, key: &str) {
        self.breakers.remove(key);
    }

    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            let mut inner = entry.value().inner.lock();
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.last_failure = None;
        }
    }

    pub fn count(&self) -> usize {
        self.breakers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = Breaker::new(5, Duration::from_secs(30));
        for _ in 0..4 {
            assert!(!breaker.record_failure());
        }
        assert!(breaker.record_failure());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn half_open_probe_after_reset_timeout_then_closes_on_success() {
        let breaker = Breaker::new(1, Duration::from_millis(10));
        assert!(breaker.record_failure());
        assert!(breaker.is_open());
        std::thread::sleep(Duration::from_millis(20));
        assert!(!breaker.is_open());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = Breaker::new(1, Duration::from_millis(5));
        breaker.record_failure();
        std::thread::sleep(Duration::from_millis(10));
        assert!(!breaker.is_open());
        assert!(breaker.record_failure());
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn success_in_closed_state_is_a_noop() {
        let breaker = Breaker::new(5, Duration::from_secs(30));
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn manager_converges_on_one_breaker_per_key() {
        let manager = BreakerManager::new();
        let a = manager.get("ns/f");
        let b = manager.get("ns/f");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn manager_remove_drops_the_breaker() {
        let manager = BreakerManager::new();
        manager.get("ns/f");
        manager.remove("ns/f");
        assert_eq!(manager.count(), 0);
    }

    #[test]
    fn manager_reset_all_clears_every_breaker() {
        let manager = BreakerManager::new();
        let breaker = manager.get("ns/f");
        breaker.record_failure();
        manager.reset_all();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
