//! Handler implementations for the two platform triggers.

pub mod block_watch;
pub mod daily_reset;

use thiserror::Error;

use warden_store::StoreError;

/// Errors that can fail a handler invocation.
///
/// Handlers do no local recovery: an error propagates to the invocation
/// loop, which logs it and leaves redelivery to the platform.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Document store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A trigger snapshot could not be decoded.
    #[error("snapshot decode error: {0}")]
    Snapshot(#[from] serde_json::Error),
}
