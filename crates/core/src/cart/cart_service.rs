//! Cart operations: optimistic merge, offline queueing and replay.

use async_trait::async_trait;
use log::{debug, info};
use serde_json::{json, Value};
use std::sync::Arc;

use super::{
    merge_item, set_item_quantity, Cart, CartAction, CartCache, CartItem, CartPatch,
    MutationPhase, OptimisticMutation, CART_APPLY_COUPON_ENDPOINT, CART_UPDATE_ENDPOINT,
};
use crate::errors::{Error, Result};
use crate::sync::{ActionDispatcher, ConnectivitySignal, QueueStore};

/// Remote cart collaborator.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// GET /cart
    async fn get_cart(&self) -> Result<Cart>;

    /// POST `endpoint` with `payload`; the server answers with the full cart.
    async fn post_cart(&self, endpoint: &str, payload: &Value) -> Result<Cart>;
}

pub struct CartService {
    api: Arc<dyn CartApi>,
    cache: Arc<CartCache>,
    queue: Arc<QueueStore<CartAction>>,
    connectivity: ConnectivitySignal,
}

impl CartService {
    pub fn new(
        api: Arc<dyn CartApi>,
        cache: Arc<CartCache>,
        queue: Arc<QueueStore<CartAction>>,
        connectivity: ConnectivitySignal,
    ) -> Self {
        Self {
            api,
            cache,
            queue,
            connectivity,
        }
    }

    /// Cached cart, or an empty one.
    pub fn current(&self) -> Cart {
        self.cache.current().unwrap_or_default()
    }

    pub fn phase(&self) -> MutationPhase {
        self.cache.phase()
    }

    /// Drop the in-memory cart; queued mutations stay persisted.
    pub fn teardown(&self) {
        self.cache.teardown();
    }

    /// Load the cart: from the server when online, from storage otherwise.
    pub async fn fetch_cart(&self) -> Result<Cart> {
        if !self.connectivity.is_connected() {
            let cart = self.cache.load_persisted().await?.unwrap_or_default();
            let ticket = self.cache.begin_read();
            self.cache.complete_read(ticket, cart.clone());
            debug!("[Cart] offline, loaded cached cart ({} items)", cart.items.len());
            return Ok(cart);
        }

        let ticket = self.cache.begin_read();
        let cart = self.api.get_cart().await?;
        if self.cache.complete_read(ticket, cart.clone()) {
            self.cache.persist(&cart).await?;
            Ok(cart)
        } else {
            // A mutation started meanwhile; its value wins.
            Ok(self.current())
        }
    }

    /// Merge `patch` optimistically and send it to `/cart/update`.
    ///
    /// Offline, the mutation is queued and [`Error::Queued`] is returned;
    /// the optimistic value stays visible.
    pub async fn update_cart(&self, patch: CartPatch) -> Result<Cart> {
        if patch.is_empty() {
            return Err(Error::invalid_input("Cart update has no fields"));
        }
        let payload = serde_json::to_value(&patch)?;
        self.mutate(CART_UPDATE_ENDPOINT, payload, &patch).await
    }

    pub async fn apply_promo(&self, code: &str) -> Result<Cart> {
        let code = normalize_code(code)?;
        self.update_cart(CartPatch::promo(code)).await
    }

    /// Apply a promo through the legacy `/cart/apply-coupon` endpoint.
    pub async fn apply_coupon(&self, code: &str) -> Result<Cart> {
        let code = normalize_code(code)?;
        let payload = json!({ "code": code });
        self.mutate(CART_APPLY_COUPON_ENDPOINT, payload, &CartPatch::promo(code))
            .await
    }

    pub async fn add_item(&self, item: CartItem) -> Result<Cart> {
        if item.quantity == 0 {
            return Err(Error::invalid_input("Quantity must be at least 1"));
        }
        let items = merge_item(&self.current().items, item);
        self.update_cart(CartPatch::items(items)).await
    }

    pub async fn set_quantity(
        &self,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: u32,
    ) -> Result<Cart> {
        let cart = self.current();
        if cart.find(product_id, variant_id).is_none() {
            return Err(Error::invalid_input(format!(
                "Product '{}' is not in the cart",
                product_id
            )));
        }
        let items = set_item_quantity(&cart.items, product_id, variant_id, quantity);
        self.update_cart(CartPatch::items(items)).await
    }

    pub async fn remove_item(&self, product_id: &str, variant_id: Option<&str>) -> Result<Cart> {
        self.set_quantity(product_id, variant_id, 0).await
    }

    /// Number of cart mutations waiting for replay.
    pub async fn pending_mutations(&self) -> Result<usize> {
        self.queue.len().await
    }

    async fn mutate(&self, endpoint: &str, payload: Value, patch: &CartPatch) -> Result<Cart> {
        let mutation = self.cache.begin_mutation(patch);

        if !self.connectivity.is_connected() {
            return self.enqueue(mutation, endpoint, payload).await;
        }

        match self.api.post_cart(endpoint, &payload).await {
            Ok(server_cart) => self.cache.confirm(mutation, server_cart).await,
            Err(err) => {
                info!("[Cart] {} failed, rolling back: {}", endpoint, err);
                self.cache.rollback(mutation);
                Err(err)
            }
        }
    }

    async fn enqueue(
        &self,
        mutation: OptimisticMutation,
        endpoint: &str,
        payload: Value,
    ) -> Result<Cart> {
        match self.queue.append(CartAction::new(endpoint, payload)).await {
            Ok(pending) => {
                info!(
                    "[Cart] offline, queued {} ({} pending)",
                    endpoint, pending
                );
                Err(Error::Queued)
            }
            Err(err) => {
                self.cache.rollback(mutation);
                Err(err)
            }
        }
    }
}

fn normalize_code(code: &str) -> Result<&str> {
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::invalid_input("Promo code is empty"));
    }
    Ok(code)
}

/// Replays queued cart mutations and keeps the cache in step with the
/// server's answers.
pub struct CartQueueDispatcher {
    api: Arc<dyn CartApi>,
    cache: Arc<CartCache>,
}

impl CartQueueDispatcher {
    pub fn new(api: Arc<dyn CartApi>, cache: Arc<CartCache>) -> Self {
        Self { api, cache }
    }
}

#[async_trait]
impl ActionDispatcher<CartAction> for CartQueueDispatcher {
    async fn dispatch(&self, action: &CartAction) -> Result<()> {
        let cart = self.api.post_cart(&action.endpoint, &action.payload).await?;
        self.cache.store_confirmed(cart).await;
        Ok(())
    }
}
