//! The engine boundary: everything above this trait treats the Wasm runtime
//! as a black box exposing `instantiate` and `Instance::call`.

use ignition_types::{Config, Settings};

/// An instantiated, executable Wasm module held by the caller (the Plugin
/// Manager owns the only references to these).
pub trait Instance: Send + Sync {
    /// Invokes `entrypoint` with `payload`, returning the engine's status
    /// code and raw output bytes. A non-zero `code` is treated by the
    /// Executor as a call failure, not a transport error.
    fn call(&self, entrypoint: &str, payload: &[u8]) -> anyhow::Result<(i32, Vec<u8>)>;

    /// Releases engine resources. Expected to be non-blocking: no I/O is
    /// performed while the Plugin Manager holds its write lock except this
    /// call.
    fn close(&self);
}

/// The Wasm execution engine: compiles and instantiates modules.
pub trait Engine: Send + Sync {
    fn instantiate(
        &self,
        bytes: &[u8],
        settings: &Settings,
        config: &Config,
    ) -> anyhow::Result<Box<dyn Instance>>;
}
