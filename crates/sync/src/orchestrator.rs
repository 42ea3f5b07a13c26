//! Drives one sync run end to end and keeps the run ledger honest.
//!
//! Lifecycle: a `pending` ledger row is written first, the catalog is fetched,
//! records are reconciled, and the row is closed as `completed` or `failed`.
//! A run report follows either terminal state.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use {
    serde::{Deserialize, Serialize},
    shelfsync_catalog::CatalogSource,
    shelfsync_common::time::now_ms,
    tracing::{error, info, warn},
};

#[cfg(feature = "metrics")]
use shelfsync_metrics::{counter, histogram, labels, sync as sync_metrics};

use crate::{
    Error, Result, SyncError,
    notify::Notifier,
    reconcile::{SyncTally, reconcile},
    store::SyncStore,
    types::{RunClose, SyncOperation, SyncRun},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Refuse a run while another one is in flight.
    pub exclusive_runs: bool,
    /// Send a run report after every run.
    pub notify: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            exclusive_runs: false,
            notify: true,
        }
    }
}

/// Summary returned to the caller of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub run_id: String,
    pub synced: u64,
    pub updated: u64,
    pub failed: u64,
}

impl SyncOutcome {
    fn new(run_id: String, tally: SyncTally) -> Self {
        Self {
            run_id,
            synced: tally.synced,
            updated: tally.updated,
            failed: tally.failed,
        }
    }
}

/// Clears the in-flight flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncOrchestrator {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn SyncStore>,
    notifier: Arc<dyn Notifier>,
    options: OrchestratorOptions,
    running: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn SyncStore>,
        notifier: Arc<dyn Notifier>,
        options: OrchestratorOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            store,
            notifier,
            options,
            running: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &Arc<dyn SyncStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Whether an exclusive run currently holds the lock.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Execute one full sync run.
    ///
    /// The ledger row ends `completed` or `failed`; the only way it can stay
    /// `pending` is a ledger write failure, which is returned as
    /// [`Error::Ledger`].
    pub async fn run_sync(
        &self,
        operation: SyncOperation,
    ) -> std::result::Result<SyncOutcome, SyncError> {
        let _guard = if self.options.exclusive_runs {
            match RunGuard::acquire(&self.running) {
                Some(guard) => Some(guard),
                None => {
                    warn!(%operation, "sync run refused, another run is in progress");
                    return Err(SyncError {
                        run_id: None,
                        source: Error::AlreadyRunning,
                    });
                },
            }
        } else {
            None
        };

        let started = Instant::now();
        let run = SyncRun::pending(operation, now_ms());
        self.store
            .insert_run(&run)
            .await
            .map_err(|e| {
                error!(error = %e, %operation, "failed to create sync run");
                SyncError {
                    run_id: None,
                    source: Error::ledger("create", e),
                }
            })?;
        info!(run_id = %run.id, %operation, "sync run started");

        let result = self.execute(&run.id).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let close = match &result {
            Ok(tally) => RunClose::Completed {
                tally: *tally,
                duration_ms,
            },
            Err(e) => RunClose::Failed {
                error: e.to_string(),
                duration_ms,
            },
        };
        let closed = self.close_run(&run.id, &close).await;
        self.record_metrics(operation, &result, duration_ms);

        match &result {
            Ok(tally) => info!(
                run_id = %run.id,
                synced = tally.synced,
                updated = tally.updated,
                failed = tally.failed,
                duration_ms,
                "sync run completed"
            ),
            Err(e) => error!(run_id = %run.id, error = %e, duration_ms, "sync run failed"),
        }

        if let Err(e) = closed {
            return Err(SyncError {
                run_id: Some(run.id),
                source: e,
            });
        }

        if self.options.notify {
            self.send_report(&run.id).await;
        }

        match result {
            Ok(tally) => Ok(SyncOutcome::new(run.id, tally)),
            Err(source) => Err(SyncError {
                run_id: Some(run.id),
                source,
            }),
        }
    }

    async fn execute(&self, run_id: &str) -> Result<SyncTally> {
        let records = self.catalog.fetch_all().await?;
        info!(run_id, count = records.len(), "catalog fetched");
        Ok(reconcile(self.store.as_ref(), &records).await)
    }

    /// Write the terminal state, retrying once.
    async fn close_run(&self, run_id: &str, close: &RunClose) -> Result<()> {
        let first = match self.store.finish_run(run_id, close).await {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        warn!(run_id, error = %first, "failed to close sync run, retrying");

        match self.store.finish_run(run_id, close).await {
            Ok(_) => Ok(()),
            // The first attempt landed after all.
            Err(Error::RunNotPending { .. }) => Ok(()),
            Err(e) => {
                error!(run_id, error = %e, "failed to close sync run");
                Err(Error::ledger("close", e))
            },
        }
    }

    async fn send_report(&self, run_id: &str) {
        let outcome = self.notifier.send_run_report(run_id).await;
        if !outcome.success {
            #[cfg(feature = "metrics")]
            counter!(sync_metrics::NOTIFY_FAILURES_TOTAL).increment(1);
            warn!(
                run_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "run report not delivered"
            );
        }
    }

    #[cfg(feature = "metrics")]
    fn record_metrics(
        &self,
        operation: SyncOperation,
        result: &Result<SyncTally>,
        duration_ms: u64,
    ) {
        let op = operation.as_str();
        counter!(sync_metrics::RUNS_TOTAL, labels::OPERATION => op).increment(1);
        histogram!(sync_metrics::RUN_DURATION_SECONDS, labels::OPERATION => op)
            .record(duration_ms as f64 / 1000.0);
        match result {
            Ok(tally) => {
                counter!(sync_metrics::RECORDS_CREATED_TOTAL).increment(tally.synced);
                counter!(sync_metrics::RECORDS_UPDATED_TOTAL).increment(tally.updated);
                counter!(sync_metrics::RECORDS_FAILED_TOTAL).increment(tally.failed);
            },
            Err(_) => {
                counter!(sync_metrics::RUNS_FAILED_TOTAL, labels::OPERATION => op).increment(1);
            },
        }
    }

    #[cfg(not(feature = "metrics"))]
    fn record_metrics(
        &self,
        _operation: SyncOperation,
        _result: &Result<SyncTally>,
        _duration_ms: u64,
    ) {
    }
}
