//! Single writer thread: every write runs in its own transaction on one
//! dedicated connection, so writers never contend for the SQLite lock.

use diesel::sqlite::SqliteConnection;
use diesel::Connection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use super::DbPool;
use crate::errors::StorageError;
use storefront_core::errors::Result;

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

#[derive(Debug, Clone)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<WriteJob>,
}

impl WriteHandle {
    /// Run `job` inside a transaction on the writer connection.
    ///
    /// An error returned by `job` rolls the transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> std::result::Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: WriteJob = Box::new(move |conn| {
            let result = conn.transaction(job);
            let _ = reply_tx.send(result);
        });

        self.sender.send(wrapped).map_err(|_| {
            StorageError::WriterUnavailable("writer thread has stopped".to_string())
        })?;

        let result = reply_rx.await.map_err(|_| {
            StorageError::WriterUnavailable("writer dropped the job".to_string())
        })?;
        Ok(result?)
    }
}

/// Start the writer thread. It exits once every handle is dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob>();

    let spawned = std::thread::Builder::new()
        .name("storefront-db-writer".to_string())
        .spawn(move || {
            let mut conn = match pool.get() {
                Ok(conn) => conn,
                Err(e) => {
                    error!("[Storage] writer could not acquire a connection: {}", e);
                    return;
                }
            };
            while let Some(job) = receiver.blocking_recv() {
                job(&mut *conn);
            }
            debug!("[Storage] writer thread stopped");
        });

    if let Err(e) = spawned {
        error!("[Storage] failed to spawn writer thread: {}", e);
    }

    WriteHandle { sender }
}
