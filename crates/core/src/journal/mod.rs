//! Journal: offline-queued create/update of product journal entries.

mod journal_model;
mod journal_service;

pub use journal_model::*;
pub use journal_service::*;
