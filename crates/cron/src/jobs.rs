//! The standing jobs: periodic sync, daily low-stock report, weekly cleanup.

use std::sync::Arc;

use {
    shelfsync_common::time::now_ms,
    shelfsync_config::ShelfsyncConfig,
    shelfsync_sync::{SyncOperation, SyncOrchestrator, purge_older_than},
    tracing::info,
};

use crate::{
    Error, Result,
    error::Context,
    service::JobDefinition,
    types::Recurrence,
};

pub const AUTO_SYNC: &str = "auto-sync-6h";
pub const LOW_STOCK_DAILY: &str = "low-stock-daily";
pub const CLEANUP_WEEKLY: &str = "cleanup-weekly";

/// Build the standing job definitions from config.
///
/// Fails if a schedule value in the config cannot be parsed.
pub fn standing_jobs(
    orchestrator: Arc<SyncOrchestrator>,
    config: &ShelfsyncConfig,
) -> Result<Vec<JobDefinition>> {
    let schedule = &config.schedule;
    let low_stock_at = schedule
        .low_stock_at()
        .context("invalid schedule.low_stock_time")?;
    let cleanup_at = schedule
        .cleanup_at()
        .context("invalid schedule.cleanup_time")?;
    let cleanup_day = schedule
        .cleanup_day()
        .context("invalid schedule.cleanup_weekday")?;
    if !(1..=24).contains(&schedule.sync_every_hours) {
        return Err(Error::message(format!(
            "schedule.sync_every_hours must be within 1..=24, got {}",
            schedule.sync_every_hours
        )));
    }

    let threshold = config.sync.low_stock_threshold;
    let retention_days = config.sync.retention_days;

    let sync = {
        let orchestrator = Arc::clone(&orchestrator);
        JobDefinition::new(
            AUTO_SYNC,
            Recurrence::every_hours(schedule.sync_every_hours),
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    let outcome = orchestrator
                        .run_sync(SyncOperation::Scheduled)
                        .await
                        .map_err(|e| Error::external("scheduled sync failed", e))?;
                    info!(run_id = %outcome.run_id, "scheduled sync done");
                    Ok(())
                }
            },
        )
    };

    let low_stock = {
        let orchestrator = Arc::clone(&orchestrator);
        JobDefinition::new(
            LOW_STOCK_DAILY,
            Recurrence::Daily {
                hour: low_stock_at.hour,
                minute: low_stock_at.minute,
            },
            move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    let outcome = orchestrator
                        .notifier()
                        .send_low_stock_report(threshold)
                        .await;
                    if outcome.success {
                        info!(
                            threshold,
                            message = outcome.message.as_deref().unwrap_or_default(),
                            "low-stock report done"
                        );
                        Ok(())
                    } else {
                        Err(Error::message(format!(
                            "low-stock report failed: {}",
                            outcome.error.as_deref().unwrap_or("unknown error")
                        )))
                    }
                }
            },
        )
    };

    let cleanup = JobDefinition::new(
        CLEANUP_WEEKLY,
        Recurrence::Weekly {
            weekday: cleanup_day,
            hour: cleanup_at.hour,
            minute: cleanup_at.minute,
        },
        move || {
            let orchestrator = Arc::clone(&orchestrator);
            async move {
                purge_older_than(orchestrator.store().as_ref(), retention_days, now_ms())
                    .await
                    .map_err(|e| Error::external("retention cleanup failed", e))?;
                Ok(())
            }
        },
    );

    Ok(vec![sync, low_stock, cleanup])
}
