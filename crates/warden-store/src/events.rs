//! Invocation stream client.
//!
//! The platform delivers handler invocations over a JSON WebSocket: scheduled
//! firings for declared schedules and document-write notifications for
//! watched collections. Every event carries a monotonically increasing
//! sequence number; reconnects resume from the last successfully handled
//! sequence, so a failed invocation is delivered again (at-least-once).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};

use crate::StoreError;

/// A scheduled-trigger firing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledFiring {
    /// Name of the schedule declaration that fired.
    pub target: String,
    /// When the platform fired the schedule.
    pub fired_at: DateTime<Utc>,
}

/// A document-write notification with before/after snapshots.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWritten {
    /// Collection the written document belongs to.
    pub collection: String,
    /// Document key within the collection.
    pub id: String,
    /// Fields before the write; `None` for creates.
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    /// Fields after the write; `None` for deletes.
    #[serde(default)]
    pub after: Option<serde_json::Value>,
}

/// One invocation delivered by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvocationEvent {
    /// A declared schedule fired.
    Scheduled(ScheduledFiring),
    /// A document in a watched collection was written.
    DocumentWritten(DocumentWritten),
}

/// Stream frame: the event plus its resume cursor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEnvelope {
    /// Monotonic position in the stream, used as the resume cursor.
    pub seq: i64,
    #[serde(flatten)]
    pub event: InvocationEvent,
}

/// Callback invoked for each delivered event.
///
/// Returning `Err` fails the invocation: the stream cursor is not advanced
/// and the connection is dropped so the platform redelivers from this event.
pub type InvocationHandler = Arc<
    dyn Fn(InvocationEvent) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>>
        + Send
        + Sync,
>;

/// WebSocket client for the platform's invocation feed.
pub struct EventStreamClient {
    /// Stream endpoint base URL (without query params).
    url: String,
    admin_key: String,
    /// Schedule targets to subscribe to.
    schedules: Vec<String>,
    /// Collections whose writes to subscribe to.
    collections: Vec<String>,
}

impl EventStreamClient {
    /// Create a new stream client with no subscriptions.
    pub fn new(url: impl Into<String>, admin_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            admin_key: admin_key.into(),
            schedules: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Subscribe to firings of a declared schedule.
    pub fn with_schedule(mut self, target: impl Into<String>) -> Self {
        self.schedules.push(target.into());
        self
    }

    /// Subscribe to writes in a collection.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collections.push(collection.into());
        self
    }

    /// Build the full WebSocket URL with query parameters.
    fn build_url(&self, cursor: Option<i64>) -> String {
        let mut url = format!("{}/v1/invocations/subscribe", self.url);

        url.push_str("?key=");
        url.push_str(&self.admin_key);

        for target in &self.schedules {
            url.push_str("&schedule=");
            url.push_str(target);
        }
        for collection in &self.collections {
            url.push_str("&collection=");
            url.push_str(collection);
        }
        if let Some(cursor) = cursor {
            url.push_str("&cursor=");
            url.push_str(&cursor.to_string());
        }

        url
    }

    /// Connect and dispatch events until shutdown.
    ///
    /// Runs in a reconnection loop with exponential backoff. A handler
    /// failure drops the connection without advancing the cursor, so the
    /// failed invocation is redelivered on reconnect.
    pub async fn run(
        &self,
        mut shutdown_rx: watch::Receiver<bool>,
        handler: InvocationHandler,
    ) -> Result<(), StoreError> {
        let mut backoff_secs = 1u64;
        let mut last_handled: Option<i64> = None;

        loop {
            if *shutdown_rx.borrow() {
                info!("invocation stream shutting down");
                return Ok(());
            }

            let url = self.build_url(last_handled);

            info!(
                schedules = ?self.schedules,
                collections = ?self.collections,
                cursor = ?last_handled,
                "connecting to invocation stream"
            );

            match self
                .connect_and_process(&url, &mut shutdown_rx, &mut last_handled, &handler)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    error!(error = %e, "invocation stream error, reconnecting");

                    let wait = Duration::from_secs(backoff_secs);
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                return Ok(());
                            }
                        }
                        _ = tokio::time::sleep(wait) => {}
                    }

                    backoff_secs = (backoff_secs * 2).min(60);
                }
            }
        }
    }

    /// Connect and process messages until error or shutdown.
    async fn connect_and_process(
        &self,
        url: &str,
        shutdown_rx: &mut watch::Receiver<bool>,
        last_handled: &mut Option<i64>,
        handler: &InvocationHandler,
    ) -> Result<(), StoreError> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| StoreError::WebSocket(format!("connection failed: {}", e)))?;

        let (_, mut read) = ws_stream.split();

        info!("invocation stream connected");

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return Ok(());
                    }
                }
                message = read.next() => {
                    let Some(message) = message else {
                        return Err(StoreError::WebSocket("stream closed by server".to_string()));
                    };
                    let message =
                        message.map_err(|e| StoreError::WebSocket(e.to_string()))?;

                    match message {
                        Message::Text(text) => {
                            let envelope: InvocationEnvelope = match serde_json::from_str(&text) {
                                Ok(envelope) => envelope,
                                Err(e) => {
                                    // Unknown event kinds must not wedge the stream
                                    warn!(error = %e, "skipping undecodable event");
                                    continue;
                                }
                            };

                            let seq = envelope.seq;
                            match handler(envelope.event).await {
                                Ok(()) => {
                                    *last_handled = Some(seq);
                                }
                                Err(e) => {
                                    error!(seq, error = %e, "invocation failed, forcing redelivery");
                                    return Err(StoreError::WebSocket(format!(
                                        "invocation {} failed: {}",
                                        seq, e
                                    )));
                                }
                            }
                        }
                        Message::Close(_) => {
                            return Err(StoreError::WebSocket(
                                "server closed the stream".to_string(),
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }
    }
}
