//! Compiling a source directory into a `.wasm` blob is explicitly out of
//! scope for this crate. `BuildService` is the seam the Manager's `build`
//! operation delegates through, an externally supplied executor wrapped
//! behind a thin adapter trait.

use ignition_types::{Error, Result};

/// Compiles `path` (a source directory) per `manifest` into Wasm bytes plus
/// their content digest. The core never computes digests itself outside of
/// this seam; every other path trusts a caller-supplied `full_digest`.
pub trait BuildService: Send + Sync {
    fn build(&self, path: &str, manifest: &str) -> Result<(Vec<u8>, String)>;
}

/// The default `BuildService`: no build toolchain is wired in, so every
/// build request fails with `function/invalid`. A daemon binary replaces
/// this with a real builder.
#[derive(Debug, Default)]
pub struct NullBuildService;

impl BuildService for NullBuildService {
    fn build(&self, path: &str, _manifest: &str) -> Result<(Vec<u8>, String)> {
        Err(Error::invalid(format!(
            "no build service configured; cannot build '{path}'"
        )))
    }
}
