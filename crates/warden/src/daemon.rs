//! Daemon wiring for the invocation loop.
//!
//! Builds the process-wide store handle, derives stream subscriptions from
//! the handler registry, and runs the invocation stream until ctrl-c.

use std::sync::Arc;

use miette::{IntoDiagnostic, Result};
use tokio::sync::watch;
use tracing::info;

use warden_store::{EventStreamClient, InvocationHandler, StoreClient};

use crate::registry::HandlerRegistry;

/// Configuration for the daemon.
pub struct DaemonConfig {
    /// Document store API base URL.
    pub store_url: String,
    /// Invocation stream base URL.
    pub stream_url: String,
    /// Admin key for both endpoints.
    pub admin_key: String,
}

/// Run the daemon until a shutdown signal arrives.
pub async fn run(config: DaemonConfig) -> Result<()> {
    // One shared admin handle for every handler, created once per process.
    // The platform manages process lifetime; no teardown is needed.
    let store = Arc::new(StoreClient::new(&config.store_url, &config.admin_key));

    let registry = Arc::new(HandlerRegistry::standard());

    let mut stream = EventStreamClient::new(&config.stream_url, &config.admin_key);
    for target in registry.schedule_targets() {
        stream = stream.with_schedule(target);
    }
    for collection in registry.watched_collections() {
        stream = stream.with_collection(collection);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let handler: InvocationHandler = {
        let registry = Arc::clone(&registry);
        let store = Arc::clone(&store);
        Arc::new(move |event| {
            let registry = Arc::clone(&registry);
            let store = Arc::clone(&store);
            Box::pin(async move {
                registry
                    .dispatch(store, event)
                    .await
                    .map_err(|e| e.to_string())
            })
        })
    };

    info!(store_url = %config.store_url, "warden daemon starting");

    stream.run(shutdown_rx, handler).await.into_diagnostic()?;

    info!("warden daemon shut down gracefully");
    Ok(())
}
