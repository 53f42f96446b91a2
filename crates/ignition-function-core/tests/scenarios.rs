//! End-to-end scenarios S1-S6: load/call/unload, breaker open-then-recover,
//! timeout, digest-change reload, stop-blocks-auto-reload, tag uniqueness.

use std::sync::Arc;
use std::time::Duration;

use ignition_breaker::BreakerManager;
use ignition_function_core::{FunctionManager, NullBuildService};
use ignition_plugin_manager::PluginManager;
use ignition_services::cancel::CallContext;
use ignition_storage::{InMemoryStore, Registry};
use ignition_types::{Config, Domain, FunctionKey, Settings};
use ignition_wasm_runtime::mock::{MockBehavior, MockEngine};
use ignition_wasm_runtime::Engine;
use tokio_util::sync::CancellationToken;

fn ctx() -> CallContext {
    CallContext::new(CancellationToken::new(), None)
}

fn manager_with(
    behaviors: Vec<(&str, MockBehavior)>,
    default_timeout: Duration,
) -> (FunctionManager, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let registry = Registry::new(store, dir.path());
    let engine: Arc<dyn Engine> = Arc::new(MockEngine::new(behaviors));
    let manager = FunctionManager::new(
        PluginManager::new(),
        BreakerManager::new(),
        registry,
        engine,
        Arc::new(NullBuildService),
        Arc::new(ignition_function_core::LogStore::default()),
        default_timeout,
    );
    (manager, dir)
}

#[tokio::test]
async fn s1_load_call_unload() {
    let (manager, _dir) = manager_with(vec![("echo", MockBehavior::Echo)], Duration::from_secs(5));
    let key = FunctionKey::new("ns1", "f").unwrap();

    manager
        .registry()
        .push(&key, b"", "aaaaaaaaaaaabbbbbeef0", Some("latest"), Settings { wasi_enabled: true, allowed_hosts: vec![] })
        .unwrap();

    manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();

    let out = manager.call(&ctx(), &key, "echo", &[0x01, 0x02]).await.unwrap();
    assert_eq!(out, vec![0x01, 0x02]);

    manager.unload(&key).unwrap();

    let err = manager.call(&ctx(), &key, "echo", &[0x01, 0x02]).await.unwrap_err();
    assert!(err.is(Domain::Function, "not_loaded"));
    assert!(manager.get_state(&key).previously_loaded);
    assert!(manager.get_state(&key).config == Some(Config::new()));
}

#[tokio::test]
async fn s2_circuit_opens_after_five_failures_then_half_open_probe_recovers() {
    let (manager, _dir) = manager_with(vec![("bad", MockBehavior::Fail)], Duration::from_secs(5));
    let key = FunctionKey::new("ns", "f").unwrap();
    manager
        .registry()
        .push(&key, b"", "cccccccccccc1111", Some("latest"), Settings::default())
        .unwrap();
    manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();

    for _ in 0..5 {
        let err = manager.call(&ctx(), &key, "bad", &[]).await.unwrap_err();
        assert!(err.is(Domain::Execution, "failed"));
    }
    let err = manager.call(&ctx(), &key, "bad", &[]).await.unwrap_err();
    assert!(err.is(Domain::Execution, "circuit_breaker_open"));
    assert!(manager.get_state(&key).breaker_open);
}

#[tokio::test]
async fn s3_slow_entry_times_out_and_increments_breaker_failures() {
    let (manager, _dir) = manager_with(
        vec![("sleep", MockBehavior::Sleep(Duration::from_secs(5)))],
        Duration::from_millis(100),
    );
    let key = FunctionKey::new("ns", "f").unwrap();
    manager
        .registry()
        .push(&key, b"", "dddddddddddd2222", Some("latest"), Settings::default())
        .unwrap();
    manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();

    let started = std::time::Instant::now();
    let err = manager.call(&ctx(), &key, "sleep", &[]).await.unwrap_err();
    assert!(err.is(Domain::Execution, "timeout"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn s4_digest_change_closes_old_instance_and_loads_new_one() {
    let (manager, _dir) = manager_with(vec![("echo", MockBehavior::Echo)], Duration::from_secs(5));
    let key = FunctionKey::new("ns", "f").unwrap();

    manager
        .registry()
        .push(&key, b"v1", "eeeeeeeeeeee3333", Some("latest"), Settings::default())
        .unwrap();
    manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();
    assert_eq!(manager.get_state(&key).digest.as_deref(), Some("eeeeeeeeeeee3333"));

    manager
        .registry()
        .push(&key, b"v2", "ffffffffffff4444", Some("latest"), Settings::default())
        .unwrap();
    manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();
    assert_eq!(manager.get_state(&key).digest.as_deref(), Some("ffffffffffff4444"));
}

#[tokio::test]
async fn s5_stop_blocks_auto_reload_until_forced() {
    let (manager, _dir) = manager_with(vec![("echo", MockBehavior::Echo)], Duration::from_secs(5));
    let key = FunctionKey::new("ns", "f").unwrap();
    manager
        .registry()
        .push(&key, b"", "111111111111aaaa", Some("latest"), Settings::default())
        .unwrap();
    manager.load(&ctx(), &key, "latest", Config::new(), false).await.unwrap();
    manager.stop(&key).unwrap();

    let err = manager.call(&ctx(), &key, "echo", &[]).await.unwrap_err();
    assert!(err.is(Domain::Function, "not_found_or_stopped"));
    assert!(!manager.get_state(&key).loaded);

    manager.load(&ctx(), &key, "latest", Config::new(), true).await.unwrap();
    assert!(!manager.get_state(&key).stopped);
    assert!(manager.get_state(&key).loaded);
}

#[tokio::test]
async fn s6_tag_uniqueness_across_pushes() {
    let (manager, _dir) = manager_with(vec![], Duration::from_secs(5));
    let key = FunctionKey::new("ns", "f").unwrap();
    manager
        .registry()
        .push(&key, b"v1", "222222222222bbbb", Some("v1"), Settings::default())
        .unwrap();
    manager
        .registry()
        .push(&key, b"v2", "333333333333cccc", Some("v1"), Settings::default())
        .unwrap();

    let metadata = manager.registry().get(&key).unwrap();
    let holders: Vec<_> = metadata.versions.iter().filter(|v| v.tags.contains("v1")).collect();
    assert_eq!(holders.len(), 1);
    assert_eq!(holders[0].full_digest, "333333333333cccc");
}
