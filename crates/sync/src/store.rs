//! Persistence trait for the run ledger, the product mirror, and the
//! notification log.

use async_trait::async_trait;

use crate::{
    Result,
    types::{LocalProduct, NotificationLogEntry, RunClose, StoreStats, SyncRun},
};

/// Persistence backend used by the orchestrator, reconciler and notifier.
#[async_trait]
pub trait SyncStore: Send + Sync {
    // ── Run ledger ──────────────────────────────────────────────────────

    async fn insert_run(&self, run: &SyncRun) -> Result<()>;

    /// Move a pending run to its terminal state and return the updated row.
    ///
    /// Fails with `RunNotFound` or `RunNotPending`; a run is closed at most once.
    async fn finish_run(&self, id: &str, close: &RunClose) -> Result<SyncRun>;

    async fn get_run(&self, id: &str) -> Result<Option<SyncRun>>;

    /// Most recent runs first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>>;

    /// Delete runs created before `cutoff_ms`. Returns the number deleted.
    async fn delete_runs_before(&self, cutoff_ms: u64) -> Result<u64>;

    // ── Product mirror ──────────────────────────────────────────────────

    async fn find_product(&self, external_id: &str) -> Result<Option<LocalProduct>>;

    /// Fails with `ProductExists` if the external id is already present.
    async fn insert_product(&self, product: &LocalProduct) -> Result<()>;

    /// Overwrite the mutable fields of an existing product. `created_at_ms`
    /// is left untouched. Fails with `ProductNotFound`.
    async fn update_product(&self, product: &LocalProduct) -> Result<()>;

    /// Products with `quantity <= threshold`, lowest quantity first.
    async fn low_stock_products(&self, threshold: i64, limit: usize) -> Result<Vec<LocalProduct>>;

    async fn stats(&self, low_stock_threshold: i64) -> Result<StoreStats>;

    // ── Notification log ────────────────────────────────────────────────

    async fn append_notification(&self, entry: &NotificationLogEntry) -> Result<()>;

    /// Most recent entries first.
    async fn recent_notifications(&self, limit: usize) -> Result<Vec<NotificationLogEntry>>;

    async fn delete_notifications_before(&self, cutoff_ms: u64) -> Result<u64>;
}
