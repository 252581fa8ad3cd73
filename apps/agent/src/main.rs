//! Headless storefront agent.
//!
//! Keeps the cart cache and the offline queues alive: replays queued cart and
//! journal writes whenever the API becomes reachable again.

mod config;
mod context;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::context::ServiceContext;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AgentConfig::from_env()?;
    info!(
        api_url = %config.api_url,
        data_dir = %config.data_dir,
        "starting storefront agent"
    );

    let context = ServiceContext::initialize(&config)?;
    let tasks = context.start(config.probe_interval);

    match context.cart_service().fetch_cart().await {
        Ok(cart) => info!(items = cart.items.len(), total = %cart.total, "cart loaded"),
        Err(e) => warn!("initial cart load failed: {}", e),
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    tasks.shutdown().await;
    let pending_cart = context.cart_service().pending_mutations().await.unwrap_or(0);
    let pending_journal = context.journal_service().pending_actions().await.unwrap_or(0);
    if pending_cart + pending_journal > 0 {
        info!(
            pending_cart,
            pending_journal, "pending writes kept for the next start"
        );
    }
    context.teardown();

    Ok(())
}
