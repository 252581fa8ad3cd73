//! Offline mutation queue: persisted FIFO, connectivity signal and replay.

mod connectivity;
mod queue_model;
mod queue_processor;
mod queue_store;

pub use connectivity::*;
pub use queue_model::*;
pub use queue_processor::*;
pub use queue_store::*;

#[cfg(test)]
mod tests;
