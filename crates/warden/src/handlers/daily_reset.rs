//! Daily view-counter reset.
//!
//! Runs once a day on the platform schedule: reads every user record, zeroes
//! `todayViews`, and stamps `lastResetAt` with the store's server clock, in
//! atomic batches.

use serde_json::json;
use tracing::info;

use warden_store::{
    Document, MAX_WRITES_PER_COMMIT, StoreClient, USER_COLLECTION, UserRecord, WriteOp,
    server_timestamp,
};

use super::HandlerError;

/// Schedule target name declared to the platform.
pub const RESET_SCHEDULE_NAME: &str = "daily-views-reset";

/// Daily at local midnight.
pub const RESET_SCHEDULE_EXPRESSION: &str = "0 0 * * *";

/// Timezone the schedule expression is evaluated in.
pub const RESET_SCHEDULE_TIMEZONE: &str = "Asia/Seoul";

/// Reset every user's daily view counter.
///
/// Resetting to zero is idempotent, so a platform retry after a partial
/// failure converges to the same state; no completion bookkeeping is kept.
pub async fn run(store: &StoreClient) -> Result<(), HandlerError> {
    let users: Vec<Document<UserRecord>> = store.list_all_documents(USER_COLLECTION).await?;

    if users.is_empty() {
        info!("no user records to reset");
        return Ok(());
    }

    let total = users.len();

    // The store caps commit size, so large collections reset across several
    // commits. Each commit is atomic on its own; the overall reset is then
    // eventually complete rather than atomic.
    for chunk in users.chunks(MAX_WRITES_PER_COMMIT) {
        let writes = chunk.iter().map(reset_write).collect();
        store.commit(writes).await?;
    }

    info!(count = total, "reset today's view counters for all users");
    Ok(())
}

/// Stage the reset for one user record.
fn reset_write(user: &Document<UserRecord>) -> WriteOp {
    WriteOp::Patch {
        collection: USER_COLLECTION.to_string(),
        id: user.id.clone(),
        fields: json!({
            "todayViews": 0,
            "lastResetAt": server_timestamp(),
        }),
    }
}
