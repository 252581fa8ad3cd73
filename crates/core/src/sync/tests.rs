use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::errors::{Error, Result};
use crate::storage::{KeyValueStore, MemoryStore};

const TEST_QUEUE_KEY: &str = "testQueue";

#[derive(Default)]
struct RecordingDispatcher {
    calls: Mutex<Vec<Value>>,
    fail_on: Mutex<Option<Value>>,
}

impl RecordingDispatcher {
    fn failing_on(action: Value) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Mutex::new(Some(action)),
        }
    }

    fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    fn heal(&self) {
        *self.fail_on.lock().unwrap() = None;
    }
}

#[async_trait]
impl ActionDispatcher<Value> for RecordingDispatcher {
    async fn dispatch(&self, action: &Value) -> Result<()> {
        self.calls.lock().unwrap().push(action.clone());
        if self.fail_on.lock().unwrap().as_ref() == Some(action) {
            return Err(Error::remote(Some(500), "boom"));
        }
        Ok(())
    }
}

/// Appends one extra action to the queue the first time it dispatches.
struct AppendingDispatcher {
    queue: Arc<QueueStore<Value>>,
    calls: Mutex<Vec<Value>>,
}

#[async_trait]
impl ActionDispatcher<Value> for AppendingDispatcher {
    async fn dispatch(&self, action: &Value) -> Result<()> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(action.clone());
            calls.len() == 1
        };
        if first {
            self.queue.append(json!({ "n": "late" })).await?;
        }
        Ok(())
    }
}

/// Drops and restores the link while its first dispatch is in flight, then
/// fails that dispatch. Later dispatches succeed.
struct FlappingDispatcher {
    connectivity: ConnectivitySignal,
    calls: Mutex<Vec<Value>>,
}

#[async_trait]
impl ActionDispatcher<Value> for FlappingDispatcher {
    async fn dispatch(&self, action: &Value) -> Result<()> {
        let first = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(action.clone());
            calls.len() == 1
        };
        if first {
            self.connectivity.set_connected(false);
            self.connectivity.set_connected(true);
            return Err(Error::remote(None, "connection reset"));
        }
        Ok(())
    }
}

fn setup(
    connected: bool,
    dispatcher: Arc<dyn ActionDispatcher<Value>>,
) -> (
    Arc<MemoryStore>,
    Arc<QueueStore<Value>>,
    ConnectivitySignal,
    Arc<QueueProcessor<Value>>,
) {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(QueueStore::new(
        store.clone() as Arc<dyn KeyValueStore>,
        TEST_QUEUE_KEY,
    ));
    let connectivity = ConnectivitySignal::new(connected);
    let processor = Arc::new(QueueProcessor::new(
        "TestQueue",
        Arc::clone(&queue),
        dispatcher,
        connectivity.clone(),
    ));
    (store, queue, connectivity, processor)
}

fn actions(count: usize) -> Vec<Value> {
    (1..=count).map(|n| json!({ "n": n })).collect()
}

#[tokio::test]
async fn full_replay_clears_key_and_goes_idle() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (store, queue, _connectivity, processor) = setup(true, dispatcher.clone());
    for action in actions(3) {
        queue.append(action).await.unwrap();
    }

    let outcome = processor.process_queue().await.unwrap();

    assert_eq!(outcome.status, DrainStatus::Drained);
    assert_eq!(outcome.processed, 3);
    assert_eq!(outcome.remaining, 0);
    assert_eq!(dispatcher.calls(), actions(3));
    assert_eq!(store.get_item(TEST_QUEUE_KEY).await.unwrap(), None);
    assert!(!processor.pending());
}

#[tokio::test]
async fn failure_keeps_failed_action_and_suffix() {
    let all = actions(4);
    let dispatcher = Arc::new(RecordingDispatcher::failing_on(all[1].clone()));
    let (_store, queue, _connectivity, processor) = setup(true, dispatcher.clone());
    queue.write(&all).await.unwrap();

    let outcome = processor.process_queue().await.unwrap();

    assert_eq!(outcome.status, DrainStatus::Blocked);
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.remaining, 3);
    assert!(outcome.last_error.is_some());
    assert_eq!(queue.read().await.unwrap(), all[1..].to_vec());
    assert!(processor.pending());
    // Stops immediately: nothing after the failed action was attempted.
    assert_eq!(dispatcher.calls(), all[..2].to_vec());

    dispatcher.heal();
    let outcome = processor.process_queue().await.unwrap();

    assert_eq!(outcome.status, DrainStatus::Drained);
    let calls = dispatcher.calls();
    // The first action is never reissued.
    assert_eq!(calls[2..].to_vec(), all[1..].to_vec());
    assert!(queue.is_empty().await.unwrap());
    assert!(!processor.pending());
}

#[tokio::test]
async fn offline_drain_is_a_noop() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (_store, queue, _connectivity, processor) = setup(false, dispatcher.clone());
    queue.write(&actions(2)).await.unwrap();

    let outcome = processor.process_queue().await.unwrap();

    assert_eq!(outcome.status, DrainStatus::Offline);
    assert!(dispatcher.calls().is_empty());
    assert_eq!(queue.len().await.unwrap(), 2);
}

#[tokio::test]
async fn empty_queue_reports_idle() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (_store, _queue, _connectivity, processor) = setup(true, dispatcher);

    let outcome = processor.process_queue().await.unwrap();

    assert_eq!(outcome.status, DrainStatus::Idle);
    assert_eq!(processor.state(), QueueState::Idle);
}

#[tokio::test]
async fn corrupt_queue_propagates_and_is_left_untouched() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (store, _queue, _connectivity, processor) = setup(true, dispatcher.clone());
    store
        .set_item(TEST_QUEUE_KEY, "[{\"n\":".to_string())
        .await
        .unwrap();

    let err = processor.process_queue().await.unwrap_err();

    assert!(matches!(err, Error::Corrupt { ref key, .. } if key == TEST_QUEUE_KEY));
    assert!(dispatcher.calls().is_empty());
    assert_eq!(
        store.get_item(TEST_QUEUE_KEY).await.unwrap().as_deref(),
        Some("[{\"n\":")
    );
}

#[tokio::test]
async fn action_appended_mid_drain_is_not_lost() {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(QueueStore::new(
        store.clone() as Arc<dyn KeyValueStore>,
        TEST_QUEUE_KEY,
    ));
    let dispatcher = Arc::new(AppendingDispatcher {
        queue: Arc::clone(&queue),
        calls: Mutex::new(Vec::new()),
    });
    let processor = QueueProcessor::new(
        "TestQueue",
        Arc::clone(&queue),
        dispatcher.clone(),
        ConnectivitySignal::new(true),
    );
    queue.write(&actions(2)).await.unwrap();

    let outcome = processor.process_queue().await.unwrap();

    assert_eq!(outcome.processed, 3);
    let calls = dispatcher.calls.lock().unwrap().clone();
    assert_eq!(calls.last(), Some(&json!({ "n": "late" })));
    assert_eq!(store.get_item(TEST_QUEUE_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_appends_keep_every_action() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let queue = Arc::new(QueueStore::<Value>::new(store, TEST_QUEUE_KEY));

    let mut handles = Vec::new();
    for n in 0..20 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            queue.append(json!({ "n": n })).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(queue.key(), TEST_QUEUE_KEY);
    assert_eq!(queue.len().await.unwrap(), 20);
}

#[tokio::test]
async fn worker_drains_on_startup_and_on_reconnect() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (_store, queue, connectivity, processor) = setup(true, dispatcher.clone());
    queue.append(json!({ "n": 1 })).await.unwrap();

    let worker = Arc::clone(&processor).spawn();
    wait_for_calls(&dispatcher, 1).await;

    connectivity.set_connected(false);
    queue.append(json!({ "n": 2 })).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(dispatcher.calls().len(), 1);

    connectivity.set_connected(true);
    wait_for_calls(&dispatcher, 2).await;
    assert_eq!(dispatcher.calls(), actions(2));

    worker.shutdown().await;
}

#[tokio::test]
async fn reconnect_during_a_failing_drain_triggers_another_drain() {
    let connectivity = ConnectivitySignal::new(true);
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let queue = Arc::new(QueueStore::<Value>::new(store, TEST_QUEUE_KEY));
    let dispatcher = Arc::new(FlappingDispatcher {
        connectivity: connectivity.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let processor = Arc::new(QueueProcessor::new(
        "FlappingQueue",
        Arc::clone(&queue),
        dispatcher.clone(),
        connectivity.clone(),
    ));
    let mut state = processor.watch_state();
    queue.append(json!({ "n": 1 })).await.unwrap();

    let worker = Arc::clone(&processor).spawn();
    assert_eq!(worker.label(), processor.label());

    tokio::time::timeout(Duration::from_secs(2), async {
        while !queue.is_empty().await.unwrap() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("queue drained after the reconnect");

    assert_eq!(dispatcher.calls.lock().unwrap().len(), 2);
    assert_eq!(connectivity.reconnects(), 1);
    state
        .wait_for(|s| *s == QueueState::Idle)
        .await
        .expect("processor alive");
    assert!(!worker.is_finished());

    worker.shutdown().await;
}

#[tokio::test]
async fn watcher_reports_reconnect_coalesced_with_disconnect() {
    let signal = ConnectivitySignal::new(true);
    let mut watcher = signal.subscribe();

    signal.set_connected(false);
    signal.set_connected(true);

    tokio::time::timeout(Duration::from_secs(1), watcher.next_reconnect())
        .await
        .expect("reconnect noticed")
        .expect("signal alive");
    assert!(watcher.is_connected());
}

async fn wait_for_calls(dispatcher: &RecordingDispatcher, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while dispatcher.calls().len() < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("dispatcher reached expected call count");
}
