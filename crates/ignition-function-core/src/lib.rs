//! Function Loader, Executor, Manager facade (with auto-reload), the build
//! service seam, and the per-function log store.

mod cancel_ext;

pub mod build;
pub mod executor;
pub mod loader;
pub mod logs;
pub mod manager;

pub use build::{BuildService, NullBuildService};
pub use executor::Executor;
pub use loader::Loader;
pub use logs::{LogLevel, LogStore};
pub use manager::{BuildOutcome, FunctionManager, FunctionState};
