//! Record model for the `users` collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection path for user records.
pub const USER_COLLECTION: &str = "users";

/// Number of blocks from other users at which an account is deactivated.
pub const BLOCK_DEACTIVATION_THRESHOLD: u32 = 10;

/// A user document as stored in the `users` collection.
///
/// Only the fields this system reads or writes are modeled. User documents
/// carry further application fields; those pass through untouched because
/// every write issued here is a partial update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Views accumulated today. Reset to zero by the daily job.
    #[serde(default)]
    pub today_views: u64,
    /// When the daily counter was last reset (server clock).
    #[serde(default)]
    pub last_reset_at: Option<DateTime<Utc>>,
    /// How many other users have blocked this account. Incremented elsewhere.
    #[serde(default)]
    pub blocked_by_count: u32,
    /// `false` means deactivated; `true` or absent means usable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// The post-write snapshot delivered with a document-write invocation.
///
/// Deliberately lenient: a missing `blockedByCount` reads as zero and a
/// missing `isActive` as still-active.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    #[serde(default)]
    pub blocked_by_count: u32,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UserSnapshot {
    /// Whether the account is currently usable. Absent `isActive` counts as
    /// active.
    pub fn is_active(&self) -> bool {
        self.is_active != Some(false)
    }
}
