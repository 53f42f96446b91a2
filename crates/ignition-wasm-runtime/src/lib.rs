//! The Wasm engine boundary: `instantiate(bytes, settings, config) ->
//! Instance`, `Instance.call(entry, payload) -> (code, output)`.

pub mod engine;
pub mod wasmtime_engine;

#[cfg(feature = "test-util")]
pub mod mock;

pub use engine::{Engine, Instance};
pub use wasmtime_engine::WasmtimeEngine;
