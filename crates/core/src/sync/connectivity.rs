//! Reactive connectivity signal.
//!
//! One boolean observable serves both the on-demand check and change
//! notifications. Producers (a reachability probe, a platform network
//! callback, tests) call [`ConnectivitySignal::set_connected`].

use log::debug;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Published value. `reconnects` counts offline -> online transitions and
/// survives the watch channel coalescing a quick off/on pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct LinkState {
    connected: bool,
    reconnects: u64,
}

#[derive(Debug, Clone)]
pub struct ConnectivitySignal {
    sender: Arc<watch::Sender<LinkState>>,
}

impl ConnectivitySignal {
    pub fn new(initially_connected: bool) -> Self {
        let (sender, _) = watch::channel(LinkState {
            connected: initially_connected,
            reconnects: 0,
        });
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.borrow().connected
    }

    /// Number of offline -> online transitions published so far.
    pub fn reconnects(&self) -> u64 {
        self.sender.borrow().reconnects
    }

    /// Publish the current status. Subscribers are only notified on an
    /// actual transition; returns whether one happened.
    pub fn set_connected(&self, connected: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if current.connected == connected {
                return false;
            }
            current.connected = connected;
            if connected {
                current.reconnects = current.reconnects.wrapping_add(1);
            }
            true
        });
        if changed {
            debug!(
                "[Connectivity] {}",
                if connected { "online" } else { "offline" }
            );
        }
        changed
    }

    /// Receive change events. The watcher starts from the current value.
    pub fn subscribe(&self) -> ConnectivityWatcher {
        let receiver = self.sender.subscribe();
        let last = *receiver.borrow();
        ConnectivityWatcher { receiver, last }
    }

    /// Invoke `callback` with every new status until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + 'static,
    {
        let mut watcher = self.subscribe();
        let handle = tokio::spawn(async move {
            while let Some(connected) = watcher.changed().await {
                callback(connected);
            }
        });
        Subscription {
            handle: Some(handle),
        }
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Subscriber side of a [`ConnectivitySignal`].
#[derive(Debug)]
pub struct ConnectivityWatcher {
    receiver: watch::Receiver<LinkState>,
    last: LinkState,
}

impl ConnectivityWatcher {
    /// Wait for the next status change. `None` once the signal is gone.
    ///
    /// A reconnect that was coalesced with the disconnect before it is still
    /// reported, as `Some(true)` if the link is up now.
    pub async fn changed(&mut self) -> Option<bool> {
        self.next_state().await.map(|state| state.connected)
    }

    /// Wait for the next offline -> online transition, including one that
    /// happened and was superseded while nobody was waiting.
    pub async fn next_reconnect(&mut self) -> Option<()> {
        loop {
            let before = self.last.reconnects;
            let state = self.next_state().await?;
            if state.reconnects != before {
                return Some(());
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.receiver.borrow().connected
    }

    async fn next_state(&mut self) -> Option<LinkState> {
        loop {
            let now = *self.receiver.borrow_and_update();
            if now != self.last {
                self.last = now;
                return Some(now);
            }
            self.receiver.changed().await.ok()?;
        }
    }
}

/// Disposer returned by [`ConnectivitySignal::on_change`].
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.abort();
    }
}
