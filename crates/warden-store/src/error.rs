//! Error types for the document store client.

use thiserror::Error;

/// Errors that can occur when talking to the document store platform.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The admin key was rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document not found.
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    /// Rate limited by the platform.
    #[error("rate limited{}", match retry_after_secs {
        Some(secs) => format!(" (retry after {}s)", secs),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying (from Retry-After header, optional).
        retry_after_secs: Option<u64>,
    },

    /// Structured error returned by the store API.
    #[error("store API error: {code} - {message}")]
    Api { code: String, message: String },

    /// Response did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A commit was staged with no writes.
    #[error("commit requires at least one write operation")]
    EmptyCommit,

    /// A commit exceeded the store's per-batch write cap.
    #[error("commit of {count} writes exceeds the {max}-write cap")]
    CommitTooLarge { count: usize, max: usize },

    /// WebSocket error on the invocation stream.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}
