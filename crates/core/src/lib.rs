//! Offline-first mutation queue and optimistic cache for the storefront client.
//!
//! Cart and journal writes made while offline are persisted to a FIFO queue
//! in key-value storage and replayed, in order, when connectivity returns.
//! Cart mutations are shown optimistically and reconciled with the server's
//! answer.

pub mod cart;
pub mod errors;
pub mod journal;
pub mod storage;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};
