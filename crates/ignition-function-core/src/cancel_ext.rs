//! Wires `ignition_services::cancel::run_cancellable` to the crate's own
//! `Result<T, ignition_types::Error>`, so the Loader and Executor can run a
//! blocking registry/engine call under cancellation without juggling
//! `anyhow::Error` at every call site.

use ignition_services::cancel::{run_cancellable, CallContext, Outcome};
use ignition_types::{Error, Result};

/// Runs `work` (a blocking closure) on a dedicated worker task and races it
/// against `ctx`. `TimedOut`/`Cancelled` surface as the matching domain
/// error; the worker itself is left to finish and its result discarded — the
/// engine call is assumed non-cancellable.
pub async fn blocking_cancellable<T, F>(ctx: &CallContext, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let future = async move {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|e| anyhow::anyhow!(e))?
            .map_err(anyhow::Error::from)
    };

    match run_cancellable(ctx, future).await {
        Outcome::Completed(value) => Ok(value),
        Outcome::Failed(e) => match e.downcast::<Error>() {
            Ok(domain_err) => Err(domain_err),
            Err(other) => Err(Error::internal(other.to_string())),
        },
        Outcome::TimedOut => Err(Error::timeout("operation timed out")),
        Outcome::Cancelled => Err(Error::cancelled("operation was cancelled")),
    }
}
