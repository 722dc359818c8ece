//! Wire types for the document store API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of writes the store accepts in a single commit.
pub const MAX_WRITES_PER_COMMIT: usize = 500;

/// A document returned from the store: its key plus decoded fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<T> {
    /// Document key, unique within its collection.
    pub id: String,
    /// Decoded document fields.
    pub fields: T,
}

/// One page of a collection listing.
#[derive(Debug, Deserialize)]
pub struct ListDocumentsResponse<T> {
    pub documents: Vec<Document<T>>,
    /// Present when more pages remain.
    pub cursor: Option<String>,
}

/// A single write operation for atomic batch commits.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum WriteOp {
    /// Merge `fields` into an existing document, leaving other fields intact.
    Patch {
        collection: String,
        id: String,
        fields: serde_json::Value,
    },
    /// Delete a document.
    Delete { collection: String, id: String },
}

/// Response from a batch commit.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    /// Server-side time at which the batch was applied.
    pub commit_time: DateTime<Utc>,
}

/// Sentinel field value replaced with the store's own clock at commit time.
///
/// The server clock keeps write ordering immune to client clock skew.
pub fn server_timestamp() -> serde_json::Value {
    serde_json::json!({ "$serverTimestamp": true })
}
