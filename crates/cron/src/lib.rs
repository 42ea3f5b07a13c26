//! Job scheduling for shelfsync: recurrence rules, the timer-driven
//! scheduler, the standing sync/report/cleanup jobs and the operator
//! control surface.

pub mod control;
pub mod error;
pub mod jobs;
pub mod schedule;
pub mod service;
pub mod types;

pub use {
    control::{Control, ControlRequest, ControlResponse},
    error::{Error, Result},
    jobs::standing_jobs,
    schedule::compute_next_run,
    service::{JobDefinition, JobScheduler},
    types::{JobStatus, Recurrence},
};
