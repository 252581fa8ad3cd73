//! Journal writes with offline queueing.

use async_trait::async_trait;
use log::{debug, info};
use std::sync::{Arc, PoisonError, RwLock};

use super::{JournalAction, JournalEntry, JournalPayload};
use crate::errors::{Error, Result};
use crate::sync::{ActionDispatcher, ConnectivitySignal, QueueStore};

/// Remote journal collaborator.
#[async_trait]
pub trait JournalApi: Send + Sync {
    /// POST /journal/entries
    async fn add_journal(&self, payload: &JournalPayload) -> Result<JournalEntry>;

    /// PUT /journal/entries/:id
    async fn update_journal(&self, id: &str, payload: &JournalPayload) -> Result<JournalEntry>;

    /// GET /journal/entries
    async fn list_journal(&self) -> Result<Vec<JournalEntry>>;
}

/// Outcome of a journal write.
#[derive(Debug, Clone, PartialEq)]
pub enum JournalSubmission {
    Sent(JournalEntry),
    Queued,
}

/// Confirmed entries kept in memory only.
#[derive(Debug, Default)]
pub struct JournalEntries {
    entries: RwLock<Vec<JournalEntry>>,
}

impl JournalEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<JournalEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn replace(&self, entries: Vec<JournalEntry>) {
        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = entries;
    }

    /// Insert or replace by id.
    pub fn upsert(&self, entry: JournalEntry) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.iter_mut().find(|existing| existing.id == entry.id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    pub fn clear(&self) {
        self.replace(Vec::new());
    }
}

pub struct JournalService {
    api: Arc<dyn JournalApi>,
    entries: Arc<JournalEntries>,
    queue: Arc<QueueStore<JournalAction>>,
    connectivity: ConnectivitySignal,
}

impl JournalService {
    pub fn new(
        api: Arc<dyn JournalApi>,
        entries: Arc<JournalEntries>,
        queue: Arc<QueueStore<JournalAction>>,
        connectivity: ConnectivitySignal,
    ) -> Self {
        Self {
            api,
            entries,
            queue,
            connectivity,
        }
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.all()
    }

    pub async fn create_entry(&self, payload: JournalPayload) -> Result<JournalSubmission> {
        validate(&payload)?;
        self.submit(JournalAction::create(payload)).await
    }

    pub async fn update_entry(
        &self,
        id: &str,
        payload: JournalPayload,
    ) -> Result<JournalSubmission> {
        validate_entry_id(id)?;
        validate(&payload)?;
        self.submit(JournalAction::update(id, payload)).await
    }

    /// Refresh confirmed entries from the server; offline returns the
    /// in-memory copy.
    pub async fn fetch_entries(&self) -> Result<Vec<JournalEntry>> {
        if !self.connectivity.is_connected() {
            debug!("[Journal] offline, serving {} cached entries", self.entries().len());
            return Ok(self.entries());
        }
        let entries = self.api.list_journal().await?;
        self.entries.replace(entries.clone());
        Ok(entries)
    }

    pub async fn pending_actions(&self) -> Result<usize> {
        self.queue.len().await
    }

    async fn submit(&self, action: JournalAction) -> Result<JournalSubmission> {
        if !self.connectivity.is_connected() {
            let pending = self.queue.append(action).await?;
            info!("[Journal] offline, queued journal action ({} pending)", pending);
            return Ok(JournalSubmission::Queued);
        }

        let entry = send_action(self.api.as_ref(), &action).await?;
        self.entries.upsert(entry.clone());
        Ok(JournalSubmission::Sent(entry))
    }
}

/// An id must fit in one URL path segment: non-empty, no `/`, no whitespace.
pub fn validate_entry_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid_input("Journal update requires an entry id"));
    }
    if id.contains('/') || id.chars().any(char::is_whitespace) {
        return Err(Error::invalid_input(format!(
            "Invalid journal entry id '{}'",
            id
        )));
    }
    Ok(())
}

fn validate(payload: &JournalPayload) -> Result<()> {
    if payload.product_id.trim().is_empty() {
        return Err(Error::invalid_input("Journal entry requires a product id"));
    }
    if let Some(rating) = payload.rating {
        if !(0.0..=5.0).contains(&rating) {
            return Err(Error::invalid_input(format!(
                "Rating {} is outside 0-5",
                rating
            )));
        }
    }
    Ok(())
}

async fn send_action(api: &dyn JournalApi, action: &JournalAction) -> Result<JournalEntry> {
    match action {
        JournalAction::Create { payload } => api.add_journal(payload).await,
        JournalAction::Update { id, payload } => api.update_journal(id, payload).await,
    }
}

/// Replays queued journal actions.
pub struct JournalQueueDispatcher {
    api: Arc<dyn JournalApi>,
    entries: Arc<JournalEntries>,
}

impl JournalQueueDispatcher {
    pub fn new(api: Arc<dyn JournalApi>, entries: Arc<JournalEntries>) -> Self {
        Self { api, entries }
    }
}

#[async_trait]
impl ActionDispatcher<JournalAction> for JournalQueueDispatcher {
    async fn dispatch(&self, action: &JournalAction) -> Result<()> {
        let entry = send_action(self.api.as_ref(), action).await?;
        self.entries.upsert(entry);
        Ok(())
    }
}
