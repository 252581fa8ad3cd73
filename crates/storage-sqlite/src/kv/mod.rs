//! SQLite persistence for the client key-value store (cart cache and queues).

mod model;
mod repository;

pub use model::KvEntryDB;
pub use repository::SqliteKeyValueStore;
