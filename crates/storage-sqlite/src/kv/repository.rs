//! Repository backing [`KeyValueStore`] with the `kv_store` table.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use storefront_core::errors::Result;
use storefront_core::storage::KeyValueStore;

use crate::db::{self, get_connection, spawn_writer, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::kv_store;

use super::model::KvEntryDB;

/// Durable key-value store. Reads go through the pool, writes through the
/// single writer so each whole-value replace is one transaction.
pub struct SqliteKeyValueStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteKeyValueStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Create (or reopen) the database under `data_dir`, migrate it and
    /// start the writer.
    pub fn open(data_dir: &str) -> Result<Self> {
        let db_path = db::init(data_dir)?;
        db::run_migrations(&db_path)?;
        let pool = db::create_pool(&db_path)?;
        let writer = spawn_writer(pool.as_ref().clone());
        Ok(Self::new(pool, writer))
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let keys = kv_store::table
            .select(kv_store::item_key)
            .order(kv_store::item_key.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(keys)
    }

    pub fn get_entry(&self, key: &str) -> Result<Option<KvEntryDB>> {
        let mut conn = get_connection(&self.pool)?;
        let row = kv_store::table
            .find(key)
            .select(KvEntryDB::as_select())
            .first::<KvEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_entry(key)?.map(|row| row.item_value))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.writer
            .exec(move |conn| {
                let now = Utc::now().to_rfc3339();
                let row = KvEntryDB {
                    item_key: key,
                    item_value: value.clone(),
                    updated_at: now.clone(),
                };

                diesel::insert_into(kv_store::table)
                    .values(&row)
                    .on_conflict(kv_store::item_key)
                    .do_update()
                    .set((
                        kv_store::item_value.eq(value),
                        kv_store::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                Ok(())
            })
            .await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(kv_store::table.find(key)).execute(conn)?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use storefront_core::storage::{CART_CACHE_KEY, CART_QUEUE_KEY};
    use storefront_core::sync::QueueStore;
    use tempfile::{tempdir, TempDir};

    fn temp_data_dir() -> (TempDir, String) {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().to_string_lossy().to_string();
        (dir, path)
    }

    #[tokio::test]
    async fn set_get_overwrite_and_remove() {
        let (_dir, data_dir) = temp_data_dir();
        let store = SqliteKeyValueStore::open(&data_dir).expect("open store");

        assert_eq!(store.get_item(CART_CACHE_KEY).await.unwrap(), None);

        store
            .set_item(CART_CACHE_KEY, "{\"items\":[]}".to_string())
            .await
            .unwrap();
        store
            .set_item(CART_CACHE_KEY, "{\"items\":[],\"total\":0}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get_item(CART_CACHE_KEY).await.unwrap().as_deref(),
            Some("{\"items\":[],\"total\":0}")
        );
        assert_eq!(store.keys().unwrap(), vec![CART_CACHE_KEY.to_string()]);

        store.remove_item(CART_CACHE_KEY).await.unwrap();
        store.remove_item(CART_CACHE_KEY).await.unwrap();
        assert_eq!(store.get_item(CART_CACHE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let (_dir, data_dir) = temp_data_dir();
        {
            let store = SqliteKeyValueStore::open(&data_dir).expect("open store");
            store
                .set_item(CART_QUEUE_KEY, "[]".to_string())
                .await
                .unwrap();
        }

        let reopened = SqliteKeyValueStore::open(&data_dir).expect("reopen store");
        let entry = reopened.get_entry(CART_QUEUE_KEY).unwrap().expect("entry");
        assert_eq!(entry.item_value, "[]");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.updated_at).is_ok());
    }

    #[tokio::test]
    async fn queue_store_round_trip_on_sqlite() {
        let (_dir, data_dir) = temp_data_dir();
        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteKeyValueStore::open(&data_dir).expect("open store"));
        let queue = QueueStore::<Value>::new(Arc::clone(&store), CART_QUEUE_KEY);

        queue.append(json!({ "endpoint": "/cart/update", "payload": { "promo": "A" } }))
            .await
            .unwrap();
        queue.append(json!({ "endpoint": "/cart/update", "payload": { "promo": "B" } }))
            .await
            .unwrap();

        assert_eq!(queue.commit_prefix(1).await.unwrap(), 1);
        assert_eq!(queue.read().await.unwrap()[0]["payload"]["promo"], "B");

        assert_eq!(queue.commit_prefix(1).await.unwrap(), 0);
        assert_eq!(store.get_item(CART_QUEUE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_write_job_rolls_back() {
        let (_dir, data_dir) = temp_data_dir();
        let db_path = db::init(&data_dir).unwrap();
        db::run_migrations(&db_path).unwrap();
        let pool = db::create_pool(&db_path).unwrap();
        let writer = spawn_writer(pool.as_ref().clone());
        let store = SqliteKeyValueStore::new(Arc::clone(&pool), writer.clone());

        let result: Result<()> = writer
            .exec(|conn| {
                diesel::insert_into(kv_store::table)
                    .values(KvEntryDB {
                        item_key: "journalQueue".to_string(),
                        item_value: "[]".to_string(),
                        updated_at: Utc::now().to_rfc3339(),
                    })
                    .execute(conn)?;
                Err(StorageError::Migration("forced failure".to_string()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(store.get_item("journalQueue").await.unwrap(), None);
    }
}
