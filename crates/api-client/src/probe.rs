//! Periodic reachability check feeding the connectivity signal.

use log::{debug, info, warn};
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;

use storefront_core::sync::ConnectivitySignal;

use crate::client::StorefrontClient;

/// Default interval between health checks.
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;

fn interval_with_jitter(interval: Duration) -> Duration {
    let base_ms = interval.as_millis().min(u128::from(u64::MAX)) as u64;
    let jitter = rand::thread_rng().gen_range(0..=(base_ms / 10).max(1));
    Duration::from_millis(base_ms.saturating_add(jitter))
}

/// Publishes `GET /health` results into a [`ConnectivitySignal`].
///
/// A transport failure or a non-2xx answer counts as offline.
pub struct ReachabilityProbe {
    client: StorefrontClient,
    connectivity: ConnectivitySignal,
    interval: Duration,
}

impl ReachabilityProbe {
    pub fn new(
        client: StorefrontClient,
        connectivity: ConnectivitySignal,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            connectivity,
            interval,
        }
    }

    /// Run one check and publish it. Returns the observed reachability.
    pub async fn check_once(&self) -> bool {
        let reachable = match self.client.check_health().await {
            Ok(()) => true,
            Err(e) => {
                debug!("[Reachability] health check failed: {}", e);
                false
            }
        };

        if self.connectivity.set_connected(reachable) {
            if reachable {
                info!("[Reachability] {} is reachable, going online", self.client.base_url());
            } else {
                warn!("[Reachability] {} is unreachable, going offline", self.client.base_url());
            }
        }
        reachable
    }

    /// Check immediately, then keep checking every interval (plus jitter).
    pub fn spawn(self) -> ProbeHandle {
        let handle = tokio::spawn(async move {
            loop {
                self.check_once().await;
                tokio::time::sleep(interval_with_jitter(self.interval)).await;
            }
        });
        ProbeHandle { handle }
    }
}

/// Running probe. Dropping it stops the loop.
pub struct ProbeHandle {
    handle: JoinHandle<()>,
}

impl ProbeHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn shutdown(self) {
        self.handle.abort();
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
