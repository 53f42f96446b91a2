//! Shared concurrency utilities: background-service lifecycle management and
//! the cancellation-aware "run a blocking op" primitive used by the Loader
//! and Executor.

pub mod cancel;
pub mod service;

pub use cancel::{run_cancellable, CallContext, Outcome};
pub use service::{RunnableService, Service, ServiceRunner, Shared, State};
