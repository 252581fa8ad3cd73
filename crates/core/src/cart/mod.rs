//! Cart: optimistic cache, offline mutation queue and replay dispatcher.

mod cart_cache;
mod cart_model;
mod cart_service;

pub use cart_cache::*;
pub use cart_model::*;
pub use cart_service::*;
