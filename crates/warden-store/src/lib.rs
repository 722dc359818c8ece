//! Document store client for warden.
//!
//! This crate provides the pieces warden needs to talk to the managed
//! document store platform:
//!
//! - **HTTP client**: collection reads, partial updates, atomic batch commits
//! - **Invocation stream**: WebSocket subscription delivering scheduled
//!   firings and document-write notifications
//! - **Record model**: the `users` collection documents and trigger snapshots

mod client;
mod error;
pub mod events;
mod records;
mod types;

pub use client::StoreClient;
pub use error::StoreError;
pub use events::{
    DocumentWritten, EventStreamClient, InvocationEnvelope, InvocationEvent, InvocationHandler,
    ScheduledFiring,
};
pub use records::{BLOCK_DEACTIVATION_THRESHOLD, USER_COLLECTION, UserRecord, UserSnapshot};
pub use types::{
    CommitResponse, Document, ListDocumentsResponse, MAX_WRITES_PER_COMMIT, WriteOp,
    server_timestamp,
};
