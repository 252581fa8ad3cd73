//! Persisted FIFO of pending actions under a single storage key.

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::{Error, Result};
use crate::storage::KeyValueStore;

/// Accessor for one queue slot in key-value storage.
///
/// The whole queue is stored as one JSON array and always rewritten as a
/// whole. Read-modify-write cycles issued through the same instance are
/// serialized, so two appends racing each other cannot drop an action.
pub struct QueueStore<A> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    lock: Mutex<()>,
    _action: PhantomData<fn() -> A>,
}

impl<A> QueueStore<A>
where
    A: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lock: Mutex::new(()),
            _action: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the queue in replay order. An absent key is an empty queue;
    /// malformed JSON is reported as [`Error::Corrupt`].
    pub async fn read(&self) -> Result<Vec<A>> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    /// Replace the whole queue.
    pub async fn write(&self, actions: &[A]) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.write_unlocked(actions).await
    }

    /// Append one action at the tail. Returns the new queue length.
    pub async fn append(&self, action: A) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut actions = self.read_unlocked().await?;
        actions.push(action);
        self.write_unlocked(&actions).await?;
        debug!("[{}] queued action, {} pending", self.key, actions.len());
        Ok(actions.len())
    }

    /// Remove the key entirely.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.remove_item(&self.key).await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.read().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop the first `count` actions after they were replayed successfully.
    ///
    /// Re-reads the stored queue so actions appended since the drain started
    /// survive. Removes the key when nothing is left. Returns the number of
    /// actions still queued.
    pub async fn commit_prefix(&self, count: usize) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let actions = self.read_unlocked().await?;
        if count == 0 {
            return Ok(actions.len());
        }

        let remaining: Vec<A> = actions.into_iter().skip(count).collect();
        if remaining.is_empty() {
            self.store.remove_item(&self.key).await?;
        } else {
            self.write_unlocked(&remaining).await?;
        }
        Ok(remaining.len())
    }

    async fn read_unlocked(&self) -> Result<Vec<A>> {
        match self.store.get_item(&self.key).await? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| Error::corrupt(&self.key, e)),
        }
    }

    async fn write_unlocked(&self, actions: &[A]) -> Result<()> {
        let json = serde_json::to_string(actions)?;
        self.store.set_item(&self.key, json).await
    }
}
