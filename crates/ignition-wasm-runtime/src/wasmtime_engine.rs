//! The default [`Engine`] implementation, built on `wasmtime` the way the
//! Filecoin FVM and Substrate's `wasmtime` executor do: one shared
//! `wasmtime::Engine`, one `Module::from_binary` + `Linker` + `Store` per
//! instantiation.
//!
//! Calling convention (documented here because the core only ever treats
//! this as a black box): a guest exports `memory`, an
//! `alloc(len: i32) -> i32` function, and the entrypoint itself as
//! `(ptr: i32, len: i32) -> (i32, i32, i32)` returning `(status_code,
//! out_ptr, out_len)`.

use anyhow::{anyhow, Context};
use ignition_types::{Config, Settings};
use parking_lot::Mutex;
use wasmtime::{Linker, Module, Store};
use wasmtime_wasi::sync::WasiCtxBuilder;
use wasmtime_wasi::WasiCtx;

use crate::engine::{Engine as IgnitionEngine, Instance as IgnitionInstance};

struct HostState {
    wasi: Option<WasiCtx>,
}

pub struct WasmtimeEngine {
    engine: wasmtime::Engine,
}

impl WasmtimeEngine {
    pub fn new() -> anyhow::Result<Self> {
        let config = wasmtime::Config::new();
        let engine = wasmtime::Engine::new(&config)?;
        Ok(Self { engine })
    }
}

impl Default for WasmtimeEngine {
    fn default() -> Self {
        Self::new().expect("wasmtime engine initialization is infallible with default config")
    }
}

impl IgnitionEngine for WasmtimeEngine {
    fn instantiate(
        &self,
        bytes: &[u8],
        settings: &Settings,
        config: &Config,
    ) -> anyhow::Result<Box<dyn IgnitionInstance>> {
        let module = Module::from_binary(&self.engine, bytes)
            .context("failed to compile Wasm module")?;

        let mut linker: Linker<HostState> = Linker::new(&self.engine);

        let wasi = if settings.wasi_enabled {
            let mut builder = WasiCtxBuilder::new();
            builder.inherit_stdio();
            for (key, value) in config {
                builder.env(key, value).context("invalid config env var")?;
            }
            if !settings.allowed_hosts.is_empty() {
                builder
                    .env("IGNITION_ALLOWED_HOSTS", settings.allowed_hosts.join(","))
                    .context("invalid allowed-hosts env var")?;
            }
            wasmtime_wasi::sync::add_to_linker(&mut linker, |state: &mut HostState| {
                state.wasi.as_mut().expect("wasi enabled for this instance")
            })?;
            Some(builder.build())
        } else {
            None
        };

        let mut store = Store::new(&self.engine, HostState { wasi });
        let instance = linker
            .instantiate(&mut store, &module)
            .context("failed to instantiate Wasm module")?;

        Ok(Box::new(WasmtimeInstance {
            store: Mutex::new(store),
            instance,
        }))
    }
}

struct WasmtimeInstance {
    // `wasmtime::Store` is `Send` but not `Sync`; the executor only ever
    // drives one call per instance at a time (the breaker gate serializes
    // access), so a mutex is never contended in practice — it exists purely
    // to satisfy `Instance: Send + Sync`.
    store: Mutex<Store<HostState>>,
    instance: wasmtime::Instance,
}

impl IgnitionInstance for WasmtimeInstance {
    fn call(&self, entrypoint: &str, payload: &[u8]) -> anyhow::Result<(i32, Vec<u8>)> {
        let mut store = self.store.lock();

        let memory = self
            .instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| anyhow!("module does not export 'memory'"))?;
        let alloc = self
            .instance
            .get_typed_func::<i32, i32>(&mut *store, "alloc")
            .context("module does not export 'alloc(len: i32) -> i32'")?;
        let entry = self
            .instance
            .get_typed_func::<(i32, i32), (i32, i32, i32)>(&mut *store, entrypoint)
            .with_context(|| format!("module does not export entrypoint '{entrypoint}'"))?;

        let ptr = alloc.call(&mut *store, payload.len() as i32)?;
        memory.write(&mut *store, ptr as usize, payload)?;

        let (code, out_ptr, out_len) = entry.call(&mut *store, (ptr, payload.len() as i32))?;

        let mut output = vec![0u8; out_len.max(0) as usize];
        if out_len > 0 {
            memory.read(&*store, out_ptr as usize, &mut output)?;
        }

        Ok((code, output))
    }

    fn close(&self) {
        // Dropping the store releases wasmtime's instance resources; there
        // is nothing else to flush, so `close` is a no-op marker for the
        // trait boundary.
    }
}
