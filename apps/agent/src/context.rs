//! Composition root: owns the store, the caches, the queues and their workers.

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;
use std::time::Duration;

use storefront_api_client::{ProbeHandle, ReachabilityProbe, StorefrontClient};
use storefront_core::cart::{CartAction, CartCache, CartQueueDispatcher, CartService};
use storefront_core::journal::{
    JournalAction, JournalEntries, JournalQueueDispatcher, JournalService,
};
use storefront_core::storage::{KeyValueStore, CART_QUEUE_KEY, JOURNAL_QUEUE_KEY};
use storefront_core::sync::{
    ConnectivitySignal, QueueProcessor, QueueStore, QueueWorker, Subscription,
};
use storefront_storage_sqlite::SqliteKeyValueStore;

use crate::config::AgentConfig;

pub struct ServiceContext {
    pub connectivity: ConnectivitySignal,
    pub api_client: StorefrontClient,
    pub cart_cache: Arc<CartCache>,
    pub journal_entries: Arc<JournalEntries>,

    // Services
    pub cart_service: Arc<CartService>,
    pub journal_service: Arc<JournalService>,

    // Queue processors
    pub cart_processor: Arc<QueueProcessor<CartAction>>,
    pub journal_processor: Arc<QueueProcessor<JournalAction>>,
}

impl ServiceContext {
    /// Open the durable store under the configured data dir and wire everything.
    pub fn initialize(config: &AgentConfig) -> Result<Self> {
        let store = SqliteKeyValueStore::open(&config.data_dir)
            .with_context(|| format!("failed to open store in {}", config.data_dir))?;
        let client = StorefrontClient::new(
            &config.api_url,
            config.access_token.clone(),
            config.request_timeout,
        )
        .context("failed to build API client")?;

        info!("[Agent] store opened in {}", config.data_dir);
        Ok(Self::build(Arc::new(store), client))
    }

    /// Wire the services over `store`. Connectivity starts offline until the
    /// probe reports otherwise.
    pub fn build(store: Arc<dyn KeyValueStore>, api_client: StorefrontClient) -> Self {
        let connectivity = ConnectivitySignal::new(false);
        let api = Arc::new(api_client.clone());

        let cart_cache = Arc::new(CartCache::new(Arc::clone(&store)));
        let cart_queue = Arc::new(QueueStore::new(Arc::clone(&store), CART_QUEUE_KEY));
        let cart_service = Arc::new(CartService::new(
            api.clone(),
            Arc::clone(&cart_cache),
            Arc::clone(&cart_queue),
            connectivity.clone(),
        ));
        let cart_processor = Arc::new(QueueProcessor::new(
            "CartQueue",
            cart_queue,
            Arc::new(CartQueueDispatcher::new(api.clone(), Arc::clone(&cart_cache))),
            connectivity.clone(),
        ));

        let journal_entries = Arc::new(JournalEntries::new());
        let journal_queue = Arc::new(QueueStore::new(Arc::clone(&store), JOURNAL_QUEUE_KEY));
        let journal_service = Arc::new(JournalService::new(
            api.clone(),
            Arc::clone(&journal_entries),
            Arc::clone(&journal_queue),
            connectivity.clone(),
        ));
        let journal_processor = Arc::new(QueueProcessor::new(
            "JournalQueue",
            journal_queue,
            Arc::new(JournalQueueDispatcher::new(api, Arc::clone(&journal_entries))),
            connectivity.clone(),
        ));

        Self {
            connectivity,
            api_client,
            cart_cache,
            journal_entries,
            cart_service,
            journal_service,
            cart_processor,
            journal_processor,
        }
    }

    pub fn connectivity(&self) -> ConnectivitySignal {
        self.connectivity.clone()
    }

    pub fn cart_service(&self) -> Arc<CartService> {
        Arc::clone(&self.cart_service)
    }

    pub fn journal_service(&self) -> Arc<JournalService> {
        Arc::clone(&self.journal_service)
    }

    /// Start the queue workers, then the probe that drives connectivity.
    pub fn start(&self, probe_interval: Duration) -> BackgroundTasks {
        let connectivity_log = self.connectivity.on_change(|online| {
            info!(
                "[Agent] connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        });
        let cart_worker = Arc::clone(&self.cart_processor).spawn();
        let journal_worker = Arc::clone(&self.journal_processor).spawn();
        let probe = ReachabilityProbe::new(
            self.api_client.clone(),
            self.connectivity(),
            probe_interval,
        )
        .spawn();

        BackgroundTasks {
            workers: vec![cart_worker, journal_worker],
            probe,
            connectivity_log,
        }
    }

    /// Drop in-memory state. Persisted queues and the cached cart survive.
    pub fn teardown(&self) {
        self.cart_cache.teardown();
        self.journal_entries.clear();
    }
}

pub struct BackgroundTasks {
    workers: Vec<QueueWorker>,
    probe: ProbeHandle,
    connectivity_log: Subscription,
}

impl BackgroundTasks {
    pub async fn shutdown(self) {
        self.probe.shutdown().await;
        for worker in self.workers {
            worker.shutdown().await;
        }
        self.connectivity_log.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::cart::{CartItem, MutationPhase};
    use storefront_core::storage::MemoryStore;
    use storefront_core::Error;
    use tempfile::tempdir;

    fn unreachable_client() -> StorefrontClient {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        StorefrontClient::new(&format!("http://{}", addr), None, Duration::from_secs(2))
            .expect("client")
    }

    #[tokio::test]
    async fn offline_mutations_queue_until_teardown() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let context = ServiceContext::build(Arc::clone(&store), unreachable_client());
        let tasks = context.start(Duration::from_secs(60));

        let item = CartItem::new("p1", "4.50".parse().unwrap(), 1);
        let result = context.cart_service().add_item(item).await;

        assert!(matches!(result, Err(Error::Queued)));
        assert_eq!(context.cart_service().pending_mutations().await.unwrap(), 1);
        assert_eq!(context.cart_cache.phase(), MutationPhase::Optimistic);
        assert!(!context.connectivity().is_connected());

        tasks.shutdown().await;
        context.teardown();

        assert_eq!(context.cart_cache.current(), None);
        assert!(store.get_item(CART_QUEUE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn initialize_opens_sqlite_store_in_data_dir() {
        let dir = tempdir().expect("tempdir");
        let config = AgentConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            access_token: None,
            data_dir: dir.path().join("agent").to_string_lossy().to_string(),
            probe_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(1),
        };

        let context = ServiceContext::initialize(&config).expect("context");
        context
            .journal_service()
            .create_entry(storefront_core::journal::JournalPayload::new("p1"))
            .await
            .unwrap();

        assert!(dir.path().join("agent").join("storefront.db").exists());
        assert_eq!(
            context.journal_service().pending_actions().await.unwrap(),
            1
        );
    }
}
