//! Catalog synchronization engine.
//!
//! One run fetches every product from the remote catalog, reconciles each
//! record against local storage independently, and records the outcome in the
//! run ledger (`sync_runs`). See [`orchestrator::SyncOrchestrator`].

pub mod error;
pub mod notify;
pub mod orchestrator;
pub mod reconcile;
pub mod retention;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result, SyncError},
    notify::{
        Delivery, LedgerNotifier, LogDelivery, NoopNotifier, Notification, Notifier, NotifyOutcome,
    },
    orchestrator::{OrchestratorOptions, SyncOrchestrator, SyncOutcome},
    reconcile::{RecordError, RecordOutcome, SyncTally, Upsert, reconcile},
    retention::{PurgeReport, purge_older_than},
    store::SyncStore,
    store_memory::InMemorySyncStore,
    store_sqlite::SqliteSyncStore,
    types::{
        LocalProduct, NotificationKind, NotificationLogEntry, RunStatus, StoreStats, SyncOperation,
        SyncRun,
    },
};

/// Run database migrations for the sync crate.
///
/// Creates the `sync_runs`, `products` and `notification_log` tables. Should be
/// called on every new pool; [`SqliteSyncStore::new`] does so itself.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
