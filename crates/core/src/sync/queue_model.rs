//! Queue processor state and drain reporting.

use serde::{Deserialize, Serialize};

/// Processor lifecycle as seen by the UI (`pending` flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Nothing left to replay.
    #[default]
    Idle,
    /// Replaying, or blocked on a failed action until the next trigger.
    Draining,
}

impl QueueState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Draining)
    }
}

/// What triggered a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainTrigger {
    Startup,
    Reconnect,
}

/// How a drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainStatus {
    /// Device was offline; the queue was not touched.
    Offline,
    /// The queue was already empty.
    Idle,
    /// Every action was replayed and the queue was cleared.
    Drained,
    /// An action failed; it and everything after it stay queued.
    Blocked,
}

/// Lightweight drain metrics, logged by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainOutcome {
    pub status: DrainStatus,
    pub processed: usize,
    /// Actions still persisted after the drain. Not inspected when offline.
    pub remaining: usize,
    pub last_error: Option<String>,
    pub duration_ms: i64,
}

impl DrainOutcome {
    pub(crate) fn offline() -> Self {
        Self {
            status: DrainStatus::Offline,
            processed: 0,
            remaining: 0,
            last_error: None,
            duration_ms: 0,
        }
    }
}
