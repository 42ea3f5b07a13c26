//! Age-based cleanup of the run ledger and notification log.

use {
    serde::{Deserialize, Serialize},
    shelfsync_common::time::days_before,
    tracing::info,
};

use crate::{Result, store::SyncStore};

/// Rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeReport {
    pub runs: u64,
    pub notifications: u64,
}

/// Delete runs and notification-log rows created more than `days` before
/// `now_ms`. Products are never touched.
pub async fn purge_older_than(
    store: &dyn SyncStore,
    days: u32,
    now_ms: u64,
) -> Result<PurgeReport> {
    let cutoff_ms = days_before(now_ms, days);
    let runs = store.delete_runs_before(cutoff_ms).await?;
    let notifications = store.delete_notifications_before(cutoff_ms).await?;
    info!(cutoff_ms, runs, notifications, "retention cleanup finished");
    Ok(PurgeReport {
        runs,
        notifications,
    })
}
