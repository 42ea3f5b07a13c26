//! Metrics for the sync engine and scheduler.
//!
//! Crates record through the `metrics` facade macros re-exported here; nothing
//! is collected until a recorder is installed with [`init_metrics`]. With the
//! `prometheus` feature the handle can render the Prometheus text format.
//!
//! ```rust,ignore
//! use shelfsync_metrics::{counter, sync};
//!
//! counter!(sync::RUNS_TOTAL, "operation" => "manual").increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
