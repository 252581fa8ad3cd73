//! Error types shared by the storefront offline layer.

use thiserror::Error;

/// Result type alias for storefront core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by a key-value store backend.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors that can occur in the offline queue and optimistic cache layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The mutation was queued for replay because the device is offline.
    ///
    /// Callers should treat this as a non-fatal outcome: the optimistic
    /// value stays visible until the queue drains.
    #[error("Mutation queued for replay while offline")]
    Queued,

    /// The remote API rejected the call or could not be reached.
    #[error("Remote call failed{}: {message}", status_suffix(.status))]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// A persisted value could not be decoded. There is no repair path.
    #[error("Corrupt value under storage key '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Storage backend failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid caller input (missing id on update, etc.)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

impl Error {
    /// Create a remote error from an optional HTTP status and message
    pub fn remote(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a corruption error for a storage key
    pub fn corrupt(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Corrupt {
            key: key.into(),
            source,
        }
    }

    /// True for the offline sentinel returned by queued mutations.
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued)
    }

    /// True when the failure came from the remote API.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// HTTP status if this is a remote error that carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => *status,
            _ => None,
        }
    }
}
