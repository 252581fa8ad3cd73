//! Key-value storage seam used by the offline queue and the cart cache.

mod memory_store;

pub use memory_store::MemoryStore;

use async_trait::async_trait;

use crate::errors::Result;

/// Storage key holding the last confirmed cart (offline reads).
pub const CART_CACHE_KEY: &str = "cart";

/// Storage key holding the pending cart mutations.
pub const CART_QUEUE_KEY: &str = "cartQueue";

/// Storage key holding the pending journal actions.
pub const JOURNAL_QUEUE_KEY: &str = "journalQueue";

/// Persistent string key-value storage.
///
/// Values are opaque strings (JSON documents in practice). Every write
/// replaces the whole value under a key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;
    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Removing an absent key is not an error.
    async fn remove_item(&self, key: &str) -> Result<()>;
}
