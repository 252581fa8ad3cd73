//! Sequential replay of a persisted queue against the remote API.

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::{
    ConnectivitySignal, DrainOutcome, DrainStatus, DrainTrigger, QueueState, QueueStore,
};
use crate::errors::Result;

/// Performs the remote call that corresponds to one queued action.
#[async_trait]
pub trait ActionDispatcher<A>: Send + Sync {
    async fn dispatch(&self, action: &A) -> Result<()>;
}

/// Drains a [`QueueStore`] in FIFO order, stopping at the first failure.
///
/// Delivery is at-least-once: processed actions are only removed from
/// storage once the drain ends, and a failed action blocks everything
/// queued behind it until the next trigger.
pub struct QueueProcessor<A> {
    label: &'static str,
    queue: Arc<QueueStore<A>>,
    dispatcher: Arc<dyn ActionDispatcher<A>>,
    connectivity: ConnectivitySignal,
    state: watch::Sender<QueueState>,
    drain_lock: Mutex<()>,
}

impl<A> QueueProcessor<A>
where
    A: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        label: &'static str,
        queue: Arc<QueueStore<A>>,
        dispatcher: Arc<dyn ActionDispatcher<A>>,
        connectivity: ConnectivitySignal,
    ) -> Self {
        let (state, _) = watch::channel(QueueState::Idle);
        Self {
            label,
            queue,
            dispatcher,
            connectivity,
            state,
            drain_lock: Mutex::new(()),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn state(&self) -> QueueState {
        *self.state.borrow()
    }

    /// True while actions are being replayed or are blocked behind a failure.
    pub fn pending(&self) -> bool {
        self.state().is_pending()
    }

    pub fn watch_state(&self) -> watch::Receiver<QueueState> {
        self.state.subscribe()
    }

    fn set_state(&self, next: QueueState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Replay the queue once.
    ///
    /// A no-op while offline. Concurrent calls are serialized: a second
    /// trigger waits for the running drain, then re-reads the queue.
    pub async fn process_queue(&self) -> Result<DrainOutcome> {
        let _guard = self.drain_lock.lock().await;
        let started_at = Instant::now();
        let mut processed_total = 0usize;

        loop {
            if !self.connectivity.is_connected() {
                debug!("[{}] offline, skipping drain", self.label);
                let mut outcome = DrainOutcome::offline();
                outcome.processed = processed_total;
                return Ok(outcome);
            }

            let actions = self.queue.read().await?;
            if actions.is_empty() {
                self.set_state(QueueState::Idle);
                let status = if processed_total > 0 {
                    DrainStatus::Drained
                } else {
                    DrainStatus::Idle
                };
                return Ok(DrainOutcome {
                    status,
                    processed: processed_total,
                    remaining: 0,
                    last_error: None,
                    duration_ms: started_at.elapsed().as_millis() as i64,
                });
            }

            self.set_state(QueueState::Draining);
            let total = actions.len();
            let mut processed = 0usize;
            let mut failure = None;
            for action in &actions {
                match self.dispatcher.dispatch(action).await {
                    Ok(()) => processed += 1,
                    Err(err) => {
                        warn!(
                            "[{}] replay stopped at action {} of {}: {}",
                            self.label,
                            processed + 1,
                            total,
                            err
                        );
                        failure = Some(err);
                        break;
                    }
                }
            }

            let remaining = self.queue.commit_prefix(processed).await?;
            processed_total += processed;

            if let Some(err) = failure {
                return Ok(DrainOutcome {
                    status: DrainStatus::Blocked,
                    processed: processed_total,
                    remaining,
                    last_error: Some(err.to_string()),
                    duration_ms: started_at.elapsed().as_millis() as i64,
                });
            }

            if remaining > 0 {
                debug!(
                    "[{}] {} action(s) queued during drain, continuing",
                    self.label, remaining
                );
            }
        }
    }

    async fn run_logged(&self, trigger: DrainTrigger) {
        match self.process_queue().await {
            Ok(outcome) => match outcome.status {
                DrainStatus::Offline | DrainStatus::Idle => {
                    debug!("[{}] {:?} drain: {:?}", self.label, trigger, outcome.status);
                }
                DrainStatus::Drained => {
                    info!(
                        "[{}] {:?} drain replayed {} action(s) in {}ms",
                        self.label, trigger, outcome.processed, outcome.duration_ms
                    );
                }
                DrainStatus::Blocked => {
                    warn!(
                        "[{}] {:?} drain blocked: processed={} remaining={} error={}",
                        self.label,
                        trigger,
                        outcome.processed,
                        outcome.remaining,
                        outcome.last_error.as_deref().unwrap_or("unknown")
                    );
                }
            },
            Err(err) => {
                error!("[{}] {:?} drain failed: {}", self.label, trigger, err);
            }
        }
    }

    /// Run in the background: one drain now, then one per reconnect.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self: Arc<Self>) -> QueueWorker {
        let label = self.label;
        // Subscribe before the first drain so no transition is missed.
        let mut watcher = self.connectivity.subscribe();
        let handle = tokio::spawn(async move {
            self.run_logged(DrainTrigger::Startup).await;
            while watcher.next_reconnect().await.is_some() {
                self.run_logged(DrainTrigger::Reconnect).await;
            }
            debug!("[{}] connectivity signal closed, worker exiting", self.label);
        });
        QueueWorker {
            label,
            handle: Some(handle),
        }
    }
}

/// Handle to a background queue worker. Dropping it stops the worker.
#[derive(Debug)]
pub struct QueueWorker {
    label: &'static str,
    handle: Option<JoinHandle<()>>,
}

impl QueueWorker {
    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Abort the worker and wait for it to wind down.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
            debug!("[{}] worker stopped", self.label);
        }
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
