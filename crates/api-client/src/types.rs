//! Wire envelopes of the storefront REST API.

use serde::{Deserialize, Serialize};
use storefront_core::cart::Cart;
use storefront_core::journal::JournalEntry;

/// `{ cart }` envelope returned by every cart endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub cart: Cart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntryResponse {
    pub entry: JournalEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntriesResponse {
    #[serde(default)]
    pub entries: Vec<JournalEntry>,
}

/// Error body sent by the API on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl ApiErrorResponse {
    pub fn describe(&self) -> String {
        match &self.code {
            Some(code) => format!("{}: {}", code, self.message),
            None => self.message.clone(),
        }
    }
}
