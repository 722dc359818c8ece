//! Block-count threshold enforcement.
//!
//! Invoked on every write to a user document. Once enough other users have
//! blocked an account, it is deactivated with a single partial update. The
//! write is conditional on the account still being active, which makes
//! redelivery (and the echo of the write's own trigger) a no-op.

use serde_json::json;
use tracing::{debug, info};

use warden_store::{
    BLOCK_DEACTIVATION_THRESHOLD, DocumentWritten, StoreClient, USER_COLLECTION, UserSnapshot,
};

use super::HandlerError;

/// Deactivate an account whose block count has crossed the threshold.
///
/// No-op invocations (count below threshold, or already inactive) return
/// without writing or logging.
pub async fn run(store: &StoreClient, event: &DocumentWritten) -> Result<(), HandlerError> {
    let Some(after) = &event.after else {
        // Deletes carry no post-write snapshot; nothing to enforce.
        debug!(user = %event.id, "ignoring delete event");
        return Ok(());
    };

    let user: UserSnapshot = serde_json::from_value(after.clone())?;

    if !should_deactivate(&user) {
        return Ok(());
    }

    store
        .patch_document(USER_COLLECTION, &event.id, json!({ "isActive": false }))
        .await?;

    info!(
        user = %event.id,
        blocked_by = user.blocked_by_count,
        "deactivated account over block threshold"
    );

    Ok(())
}

/// Whether a post-write snapshot calls for deactivation.
///
/// True only when the block count has reached the threshold and the account
/// is still active. Already-inactive accounts are never re-written, so the
/// active → inactive transition fires at most once.
pub fn should_deactivate(user: &UserSnapshot) -> bool {
    user.blocked_by_count >= BLOCK_DEACTIVATION_THRESHOLD && user.is_active()
}
