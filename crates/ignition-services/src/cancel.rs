//! The "run a blocking op under cancellation" pattern: a join between a
//! detached `tokio::task` and a cancellation/deadline future.
//!
//! The worker is never told to stop: the underlying engine call is assumed
//! non-cancellable. This module only guarantees the *foreground* observes
//! cancellation promptly; a timed-out or cancelled worker keeps running in
//! the background and its result is simply dropped.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// The call's execution context: a cancellation token plus an optional
/// deadline. A deadline that elapses produces [`Outcome::TimedOut`]; an
/// externally-triggered `cancel` produces [`Outcome::Cancelled`] — the two
/// are always distinguishable to the caller.
#[derive(Clone)]
pub struct CallContext {
    pub cancel: CancellationToken,
    pub deadline: Option<Duration>,
}

impl CallContext {
    pub fn new(cancel: CancellationToken, deadline: Option<Duration>) -> Self {
        Self { cancel, deadline }
    }

    pub fn with_deadline(deadline: Duration) -> Self {
        Self::new(CancellationToken::new(), Some(deadline))
    }
}

pub enum Outcome<T> {
    Completed(T),
    Failed(anyhow::Error),
    TimedOut,
    Cancelled,
}

/// Spawns `work` on its own task and races it against `ctx`'s deadline and
/// cancellation signal. On timeout or cancellation the spawned task is left
/// to run to completion; its result, if any, is discarded.
pub async fn run_cancellable<F, T>(ctx: &CallContext, work: F) -> Outcome<T>
where
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::task::spawn(work);

    let deadline = ctx.deadline;
    let sleep = async move {
        match deadline {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    let cancelled = ctx.cancel.clone().cancelled_owned();

    tokio::select! {
        biased;

        result = handle => match result {
            Ok(Ok(value)) => Outcome::Completed(value),
            Ok(Err(e)) => Outcome::Failed(e),
            Err(join_err) => Outcome::Failed(anyhow::anyhow!(join_err)),
        },

        _ = sleep => Outcome::TimedOut,

        _ = cancelled => Outcome::Cancelled,
    }
}
