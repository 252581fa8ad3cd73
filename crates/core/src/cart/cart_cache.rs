//! In-memory cart cache with optimistic mutation bookkeeping.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Cart, CartPatch};
use crate::errors::{Error, Result};
use crate::storage::{KeyValueStore, CART_CACHE_KEY};

/// Where the most recent cart mutation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPhase {
    #[default]
    Idle,
    /// Speculative value shown, server has not confirmed it (or it is queued).
    Optimistic,
    /// Server response replaced the speculative value.
    Confirmed,
    /// Server rejected the mutation; the snapshot was restored.
    RolledBack,
}

/// An optimistic mutation in flight. Carries the value to restore on failure.
#[derive(Debug)]
#[must_use = "an optimistic mutation must be confirmed, rolled back or left queued"]
pub struct OptimisticMutation {
    snapshot: Option<Cart>,
    optimistic: Cart,
}

impl OptimisticMutation {
    pub fn snapshot(&self) -> Option<&Cart> {
        self.snapshot.as_ref()
    }

    pub fn optimistic(&self) -> &Cart {
        &self.optimistic
    }
}

/// Token identifying a cart read. Stale once a mutation cancels reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTicket(u64);

#[derive(Debug, Default)]
struct CacheState {
    cart: Option<Cart>,
    read_generation: u64,
    phase: MutationPhase,
}

/// Client-side cache of the last known cart.
///
/// Owned by the composition root; [`CartCache::teardown`] drops the memory
/// copy. Confirmed carts are also written to the `cart` storage key so they
/// can be shown while offline.
pub struct CartCache {
    state: Mutex<CacheState>,
    store: Arc<dyn KeyValueStore>,
}

impl CartCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            store,
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current(&self) -> Option<Cart> {
        self.state().cart.clone()
    }

    pub fn phase(&self) -> MutationPhase {
        self.state().phase
    }

    /// Start a read; its result is only stored if no mutation started since.
    pub fn begin_read(&self) -> ReadTicket {
        ReadTicket(self.state().read_generation)
    }

    /// Store a fetched cart. Returns false when the read was cancelled.
    pub fn complete_read(&self, ticket: ReadTicket, cart: Cart) -> bool {
        let mut state = self.state();
        if state.read_generation != ticket.0 {
            debug!("[CartCache] discarding cancelled read");
            return false;
        }
        state.cart = Some(cart);
        true
    }

    /// Invalidate every read currently in flight.
    pub fn cancel_reads(&self) {
        let mut state = self.state();
        state.read_generation = state.read_generation.wrapping_add(1);
    }

    /// Cancel reads, snapshot the current cart and show the merged value.
    pub fn begin_mutation(&self, patch: &CartPatch) -> OptimisticMutation {
        let mut state = self.state();
        state.read_generation = state.read_generation.wrapping_add(1);
        let snapshot = state.cart.clone();
        let optimistic = snapshot.clone().unwrap_or_default().merge(patch);
        state.cart = Some(optimistic.clone());
        state.phase = MutationPhase::Optimistic;
        OptimisticMutation {
            snapshot,
            optimistic,
        }
    }

    /// Replace the speculative value with the server cart and persist it.
    pub async fn confirm(&self, mutation: OptimisticMutation, server_cart: Cart) -> Result<Cart> {
        debug!(
            "[CartCache] server confirmed mutation (items {} -> {})",
            mutation.snapshot.as_ref().map_or(0, |c| c.items.len()),
            server_cart.items.len()
        );
        {
            let mut state = self.state();
            state.cart = Some(server_cart.clone());
            state.phase = MutationPhase::Confirmed;
        }
        self.persist(&server_cart).await?;
        Ok(server_cart)
    }

    /// Restore the pre-mutation snapshot.
    pub fn rollback(&self, mutation: OptimisticMutation) {
        let mut state = self.state();
        state.cart = mutation.snapshot;
        state.phase = MutationPhase::RolledBack;
    }

    /// Store an authoritative cart that did not come from a tracked
    /// mutation (queue replay). Reads started earlier are cancelled.
    /// Persistence failures are logged only.
    pub async fn store_confirmed(&self, cart: Cart) {
        {
            let mut state = self.state();
            state.read_generation = state.read_generation.wrapping_add(1);
            state.cart = Some(cart.clone());
            state.phase = MutationPhase::Confirmed;
        }
        if let Err(err) = self.persist(&cart).await {
            warn!("[CartCache] failed to persist replayed cart: {}", err);
        }
    }

    pub async fn persist(&self, cart: &Cart) -> Result<()> {
        let json = serde_json::to_string(cart)?;
        self.store.set_item(CART_CACHE_KEY, json).await
    }

    /// Last cart written to storage, if any.
    pub async fn load_persisted(&self) -> Result<Option<Cart>> {
        match self.store.get_item(CART_CACHE_KEY).await? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| Error::corrupt(CART_CACHE_KEY, e)),
        }
    }

    /// Drop the in-memory copy. The persisted cart is kept.
    pub fn teardown(&self) {
        let mut state = self.state();
        state.cart = None;
        state.phase = MutationPhase::Idle;
        state.read_generation = state.read_generation.wrapping_add(1);
    }
}
