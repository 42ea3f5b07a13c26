//! Metric name and label definitions.
//!
//! Every metric emitted by shelfsync is named here so the full set is visible
//! in one place.

/// Sync run metrics
pub mod sync {
    /// Total sync runs started, labelled by operation
    pub const RUNS_TOTAL: &str = "shelfsync_sync_runs_total";
    /// Sync runs that ended in the failed state
    pub const RUNS_FAILED_TOTAL: &str = "shelfsync_sync_runs_failed_total";
    /// Wall-clock duration of a run in seconds
    pub const RUN_DURATION_SECONDS: &str = "shelfsync_sync_run_duration_seconds";
    /// Records created locally for the first time
    pub const RECORDS_CREATED_TOTAL: &str = "shelfsync_sync_records_created_total";
    /// Records overwritten in place
    pub const RECORDS_UPDATED_TOTAL: &str = "shelfsync_sync_records_updated_total";
    /// Records that could not be reconciled
    pub const RECORDS_FAILED_TOTAL: &str = "shelfsync_sync_records_failed_total";
    /// Catalog page requests issued
    pub const CATALOG_PAGES_TOTAL: &str = "shelfsync_sync_catalog_pages_total";
    /// Notifications that did not go out
    pub const NOTIFY_FAILURES_TOTAL: &str = "shelfsync_sync_notify_failures_total";
}

/// Scheduler metrics
pub mod scheduler {
    /// Jobs currently registered
    pub const JOBS_REGISTERED: &str = "shelfsync_scheduler_jobs_registered";
    /// Job firings, labelled by job name
    pub const FIRINGS_TOTAL: &str = "shelfsync_scheduler_firings_total";
    /// Job handler invocations that returned an error
    pub const HANDLER_ERRORS_TOTAL: &str = "shelfsync_scheduler_handler_errors_total";
    /// Job handler duration in seconds
    pub const HANDLER_DURATION_SECONDS: &str = "shelfsync_scheduler_handler_duration_seconds";
}

/// Common label keys
pub mod labels {
    pub const OPERATION: &str = "operation";
    pub const JOB: &str = "job";
}

/// Histogram bucket boundaries
pub mod buckets {
    /// Sync run duration buckets (in seconds), 100ms to 30 minutes
    pub const RUN_DURATION: &[f64] = &[
        0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
    ];
}
