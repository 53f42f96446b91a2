//! Background-service lifecycle: a `RunnableService` is driven to completion
//! by a `ServiceRunner` that exposes `start`/`stop`/`stop_and_await`/`state`
//! over a `tokio::sync::watch` channel.

use std::sync::Arc;

use anyhow::anyhow;
use tokio::{sync::watch, task::JoinHandle};

pub type Shared<T> = Arc<T>;

#[async_trait::async_trait]
pub trait Service {
    fn start(&self) -> anyhow::Result<()>;

    fn stop(&self) -> bool;

    async fn stop_and_await(&self) -> anyhow::Result<()>;

    fn state(&self) -> State;
}

#[async_trait::async_trait]
pub trait RunnableService: Send + Sync {
    type SharedData: Send + Sync;

    fn shared_data(&self) -> Shared<Self::SharedData>;

    async fn initialize(&mut self) -> anyhow::Result<()>;

    /// The runner calls `run` until it returns `Ok(false)`.
    async fn run(&mut self) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone)]
pub enum State {
    NotStarted,
    Started,
    Stopping,
    Stopped,
    StoppedWithError(String),
}

impl State {
    pub fn not_started(&self) -> bool {
        matches!(self, State::NotStarted)
    }

    pub fn started(&self) -> bool {
        matches!(self, State::Started)
    }

    pub fn stopped(&self) -> bool {
        matches!(self, State::Stopped | State::StoppedWithError(_))
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotStarted, Self::NotStarted) => true,
            (Self::Started, Self::Started) => true,
            (Self::Stopping, Self::Stopping) => true,
            (Self::Stopped, Self::Stopped) => true,
            (Self::StoppedWithError(_), Self::StoppedWithError(_)) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct ServiceRunner<S>
where
    S: RunnableService,
{
    pub shared: Shared<S::SharedData>,
    state: Shared<watch::Sender<State>>,
}

impl<S> Clone for ServiceRunner<S>
where
    S: RunnableService,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S> ServiceRunner<S>
where
    S: RunnableService + 'static,
{
    pub fn new(service: S) -> Self {
        let shared = service.shared_data();
        let state = initialize_loop(service);
        Self { shared, state }
    }
}

#[async_trait::async_trait]
impl<S> Service for ServiceRunner<S>
where
    S: RunnableService,
{
    fn start(&self) -> anyhow::Result<()> {
        let started = self.state.send_if_modified(|state| {
            if state.not_started() {
                *state = State::Started;
                true
            } else {
                false
            }
        });
        if started {
            Ok(())
        } else {
            Err(anyhow!("the service has already been started"))
        }
    }

    fn stop(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.started() {
                *state = State::Stopping;
                true
            } else {
                false
            }
        })
    }

    async fn stop_and_await(&self) -> anyhow::Result<()> {
        let mut stop = self.state.subscribe();
        if stop.borrow().stopped() {
            return Ok(());
        }
        self.stop();
        loop {
            if stop.borrow_and_update().stopped() {
                return Ok(());
            }
            stop.changed().await?;
        }
    }

    fn state(&self) -> State {
        self.state.borrow().clone()
    }
}

fn initialize_loop<S>(service: S) -> Shared<watch::Sender<State>>
where
    S: RunnableService + 'static,
{
    let (sender, receiver) = watch::channel(State::NotStarted);
    let state = Shared::new(sender);
    let stop_sender = state.clone();
    tokio::task::spawn(async move {
        let join_handle = run(service, receiver.clone());
        let result = join_handle.await;

        let stopped_state = match result {
            Ok(Err(e)) => State::StoppedWithError(e.to_string()),
            Err(e) => State::StoppedWithError(e.to_string()),
            Ok(Ok(())) => State::Stopped,
        };

        let _ = stop_sender.send_if_modified(|state| {
            if !state.stopped() {
                *state = stopped_state;
                true
            } else {
                false
            }
        });
    });
    state
}

fn run<S>(mut service: S, mut state: watch::Receiver<State>) -> JoinHandle<anyhow::Result<()>>
where
    S: RunnableService + 'static,
{
    tokio::task::spawn(async move {
        if state.borrow_and_update().not_started() {
            state.changed().await?;
        }
        if !state.borrow().started() {
            return Ok(());
        }

        service.initialize().await?;
        loop {
            tokio::select! {
                biased;

                _ = state.changed() => {
                    if !state.borrow_and_update().started() {
                        return Ok(());
                    }
                }

                result = service.run() => {
                    match result {
                        Ok(should_continue) => {
                            if !should_continue {
                                return Ok(());
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "service iteration failed");
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        ticks: Arc<std::sync::atomic::AtomicU32>,
    }

    #[async_trait::async_trait]
    impl RunnableService for Counter {
        type SharedData = ();

        fn shared_data(&self) -> Shared<Self::SharedData> {
            Shared::new(())
        }

        async fn initialize(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn run(&mut self) -> anyhow::Result<bool> {
            self.ticks.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn start_runs_and_stop_halts() {
        let ticks = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let runner = ServiceRunner::new(Counter {
            ticks: ticks.clone(),
        });
        runner.start().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        runner.stop_and_await().await.unwrap();
        assert!(ticks.load(std::sync::atomic::Ordering::SeqCst) > 0);
        assert!(runner.state().stopped());
    }
}
