//! REST client for the storefront API and the reachability probe.

pub mod client;
pub mod error;
pub mod probe;
pub mod types;

pub use client::{StorefrontClient, DEFAULT_TIMEOUT_SECS};
pub use error::{ApiError, Result};
pub use probe::{ProbeHandle, ReachabilityProbe, DEFAULT_PROBE_INTERVAL_SECS};
