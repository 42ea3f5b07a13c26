//! Named-job scheduler: one timer task per job, one task per firing.

use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use {
    shelfsync_common::time::now_ms,
    tokio::{sync::Mutex, task::JoinHandle},
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use shelfsync_metrics::{counter, gauge, histogram, labels, scheduler as scheduler_metrics};

use crate::{
    Error, Result,
    schedule::compute_next_run,
    types::{JobState, JobStatus, Recurrence},
};

/// Future returned by a job handler.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// Work performed each time a job fires.
pub type JobHandler = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// A job as registered on start: name, rule and handler.
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub recurrence: Recurrence,
    pub handler: JobHandler,
}

impl JobDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, recurrence: Recurrence, handler: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            recurrence,
            handler: Arc::new(move || -> JobFuture { Box::pin(handler()) }),
        }
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("recurrence", &self.recurrence)
            .finish_non_exhaustive()
    }
}

struct RegisteredJob {
    definition: JobDefinition,
    state: Arc<StdMutex<JobState>>,
    timer: JoinHandle<()>,
}

impl RegisteredJob {
    fn start(definition: JobDefinition) -> Self {
        let state = Arc::new(StdMutex::new(JobState::default()));
        let timer = spawn_timer(definition.clone(), Arc::clone(&state));
        Self {
            definition,
            state,
            timer,
        }
    }

    fn status(&self) -> JobStatus {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        JobStatus {
            name: self.definition.name.clone(),
            running: !self.timer.is_finished(),
            recurrence: self.definition.recurrence.clone(),
            next_run_at_ms: state.next_run_at_ms,
            last_run_at_ms: state.last_run_at_ms,
            last_error: state.last_error.clone(),
            last_duration_ms: state.last_duration_ms,
        }
    }
}

/// The job scheduler.
///
/// Owns the registry of named jobs. Construct it with the standing job
/// definitions; nothing fires until [`JobScheduler::start`].
pub struct JobScheduler {
    definitions: Vec<JobDefinition>,
    jobs: Mutex<BTreeMap<String, RegisteredJob>>,
}

impl JobScheduler {
    pub fn new(definitions: Vec<JobDefinition>) -> Arc<Self> {
        Arc::new(Self {
            definitions,
            jobs: Mutex::new(BTreeMap::new()),
        })
    }

    /// Register every standing job that is not already registered.
    ///
    /// Calling this again is harmless: existing entries keep their timers.
    pub async fn start(&self) {
        let mut jobs = self.jobs.lock().await;
        let mut added = 0;
        for def in &self.definitions {
            if jobs.contains_key(&def.name) {
                debug!(job = %def.name, "job already registered");
                continue;
            }
            info!(job = %def.name, recurrence = ?def.recurrence, "job registered");
            jobs.insert(def.name.clone(), RegisteredJob::start(def.clone()));
            added += 1;
        }

        #[cfg(feature = "metrics")]
        gauge!(scheduler_metrics::JOBS_REGISTERED).set(jobs.len() as f64);

        info!(added, total = jobs.len(), "scheduler started");
    }

    /// Halt and deregister every job. Firings already in flight finish on
    /// their own.
    pub async fn stop(&self) {
        let mut jobs = self.jobs.lock().await;
        for (name, job) in std::mem::take(&mut *jobs) {
            job.timer.abort();
            debug!(job = %name, "job stopped");
        }

        #[cfg(feature = "metrics")]
        gauge!(scheduler_metrics::JOBS_REGISTERED).set(0.0);

        info!("scheduler stopped");
    }

    /// Stop and restart one job in place. Returns `false` if no job has that
    /// name; nothing changes in that case.
    pub async fn restart_job(&self, name: &str) -> bool {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(name) else {
            warn!(job = name, "restart requested for unknown job");
            return false;
        };
        job.timer.abort();
        job.timer = spawn_timer(job.definition.clone(), Arc::clone(&job.state));
        info!(job = name, "job restarted");
        true
    }

    /// Fire a job now without touching its schedule.
    pub async fn run_now(&self, name: &str) -> Result<()> {
        let jobs = self.jobs.lock().await;
        let job = jobs.get(name).ok_or_else(|| Error::job_not_found(name))?;
        info!(job = name, "job fired manually");
        fire(&job.definition, &job.state);
        Ok(())
    }

    /// Snapshot of every registered job, ordered by name.
    pub async fn status(&self) -> Vec<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.values().map(RegisteredJob::status).collect()
    }

    pub fn definitions(&self) -> &[JobDefinition] {
        &self.definitions
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        for job in self.jobs.get_mut().values() {
            job.timer.abort();
        }
    }
}

/// Sleep until each next fire time and hand the firing off to its own task.
fn spawn_timer(definition: JobDefinition, state: Arc<StdMutex<JobState>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = now_ms();
            let next = match compute_next_run(&definition.recurrence, now) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    info!(job = %definition.name, "no further firings");
                    set_state(&state, |s| s.next_run_at_ms = None);
                    break;
                },
                Err(e) => {
                    error!(job = %definition.name, error = %e, "cannot compute next firing");
                    set_state(&state, |s| {
                        s.next_run_at_ms = None;
                        s.last_error = Some(e.to_string());
                    });
                    break;
                },
            };
            set_state(&state, |s| s.next_run_at_ms = Some(next));
            debug!(job = %definition.name, next_run_at_ms = next, "job armed");

            tokio::time::sleep(Duration::from_millis(next.saturating_sub(now_ms()))).await;
            fire(&definition, &state);
        }
    })
}

/// Run the handler as an independent task. Errors and panics are caught here
/// and only recorded.
fn fire(definition: &JobDefinition, state: &Arc<StdMutex<JobState>>) {
    let name = definition.name.clone();
    let handler = Arc::clone(&definition.handler);
    let state = Arc::clone(state);

    tokio::spawn(async move {
        let started = now_ms();
        info!(job = %name, "job firing");

        #[cfg(feature = "metrics")]
        counter!(scheduler_metrics::FIRINGS_TOTAL, labels::JOB => name.clone()).increment(1);

        let outcome = match tokio::spawn(handler()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(join) => Some(format!("handler panicked: {join}")),
        };
        let duration_ms = now_ms().saturating_sub(started);

        #[cfg(feature = "metrics")]
        histogram!(scheduler_metrics::HANDLER_DURATION_SECONDS, labels::JOB => name.clone())
            .record(duration_ms as f64 / 1000.0);

        match &outcome {
            None => info!(job = %name, duration_ms, "job finished"),
            Some(err) => {
                #[cfg(feature = "metrics")]
                counter!(scheduler_metrics::HANDLER_ERRORS_TOTAL, labels::JOB => name.clone())
                    .increment(1);
                error!(job = %name, error = %err, duration_ms, "job failed");
            },
        }

        set_state(&state, |s| {
            s.last_run_at_ms = Some(started);
            s.last_duration_ms = Some(duration_ms);
            s.last_error = outcome;
        });
    });
}

fn set_state(state: &StdMutex<JobState>, f: impl FnOnce(&mut JobState)) {
    let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard);
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn hourly() -> Recurrence {
        Recurrence::every_hours(1)
    }

    fn noop(name: &str, recurrence: Recurrence) -> JobDefinition {
        JobDefinition::new(name, recurrence, || async { Ok(()) })
    }

    fn counting(name: &str, recurrence: Recurrence, counter: Arc<AtomicUsize>) -> JobDefinition {
        JobDefinition::new(name, recurrence, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn standing() -> Vec<JobDefinition> {
        vec![
            noop("auto-sync-6h", Recurrence::every_hours(6)),
            noop("low-stock-daily", Recurrence::Daily { hour: 9, minute: 0 }),
            noop("cleanup-weekly", Recurrence::Weekly {
                weekday: chrono::Weekday::Sun,
                hour: 2,
                minute: 0,
            }),
        ]
    }

    #[tokio::test]
    async fn start_registers_standing_jobs() {
        let sched = JobScheduler::new(standing());
        assert!(sched.status().await.is_empty());

        sched.start().await;
        let status = sched.status().await;
        let names: Vec<_> = status.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["auto-sync-6h", "cleanup-weekly", "low-stock-daily"]);
        assert!(status.iter().all(|s| s.running));
        assert!(status.iter().all(|s| s.last_run_at_ms.is_none()));
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let sched = JobScheduler::new(standing());
        sched.start().await;
        sched.start().await;
        assert_eq!(sched.status().await.len(), 3);
    }

    #[tokio::test]
    async fn next_run_is_reported() {
        let sched = JobScheduler::new(vec![noop("hourly", hourly())]);
        sched.start().await;

        let now = now_ms();
        let mut next = None;
        for _ in 0..100 {
            next = sched.status().await[0].next_run_at_ms;
            if next.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let next = next.unwrap();
        assert!(next > now);
        assert_eq!(next % (60 * 60 * 1000), 0);
    }

    #[tokio::test]
    async fn stop_deregisters_everything() {
        let sched = JobScheduler::new(standing());
        sched.start().await;
        sched.stop().await;
        assert!(sched.status().await.is_empty());

        // Start after stop registers afresh.
        sched.start().await;
        assert_eq!(sched.status().await.len(), 3);
    }

    #[tokio::test]
    async fn restart_unknown_job_is_false() {
        let sched = JobScheduler::new(standing());
        sched.start().await;
        let entries = |status: Vec<JobStatus>| {
            status
                .into_iter()
                .map(|s| (s.name, s.running))
                .collect::<Vec<_>>()
        };
        let before = entries(sched.status().await);

        assert!(!sched.restart_job("nonexistent").await);
        assert_eq!(entries(sched.status().await), before);
    }

    #[tokio::test]
    async fn restart_keeps_one_running_entry() {
        let sched = JobScheduler::new(standing());
        sched.start().await;

        assert!(sched.restart_job("auto-sync-6h").await);
        let status = sched.status().await;
        let matching: Vec<_> = status.iter().filter(|s| s.name == "auto-sync-6h").collect();
        assert_eq!(matching.len(), 1);
        assert!(matching[0].running);
        assert_eq!(status.len(), 3);
    }

    #[tokio::test]
    async fn restart_before_start_is_false() {
        let sched = JobScheduler::new(standing());
        assert!(!sched.restart_job("auto-sync-6h").await);
        assert!(sched.status().await.is_empty());
    }

    #[tokio::test]
    async fn interval_job_fires_repeatedly() {
        let count = Arc::new(AtomicUsize::new(0));
        let sched = JobScheduler::new(vec![counting(
            "fast",
            Recurrence::Every {
                every_ms: 20,
                anchor_ms: None,
            },
            Arc::clone(&count),
        )]);
        sched.start().await;

        wait_for(|| count.load(Ordering::SeqCst) >= 2).await;
        sched.stop().await;
    }

    #[tokio::test]
    async fn failing_handler_keeps_job_scheduled() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let def = {
            let attempts = Arc::clone(&attempts);
            JobDefinition::new(
                "flaky",
                Recurrence::Every {
                    every_ms: 20,
                    anchor_ms: None,
                },
                move || {
                    let attempts = Arc::clone(&attempts);
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        Err(Error::message("catalog unreachable"))
                    }
                },
            )
        };
        let sched = JobScheduler::new(vec![def]);
        sched.start().await;

        wait_for(|| attempts.load(Ordering::SeqCst) >= 2).await;
        // The error lands in state after the handler returns.
        tokio::time::sleep(Duration::from_millis(30)).await;
        let status = sched.status().await;
        assert!(status[0].running);
        assert_eq!(status[0].last_error.as_deref(), Some("catalog unreachable"));
        assert!(status[0].last_run_at_ms.is_some());
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        fn explode() -> Result<()> {
            panic!("handler exploded")
        }
        let sched = JobScheduler::new(vec![JobDefinition::new("boom", hourly(), || async {
            explode()
        })]);
        sched.start().await;
        sched.run_now("boom").await.unwrap();

        let mut last_error = None;
        for _ in 0..100 {
            last_error = sched.status().await[0].last_error.clone();
            if last_error.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(last_error.unwrap().contains("panicked"));
        assert!(sched.status().await[0].running);
    }

    #[tokio::test]
    async fn run_now_fires_once_without_rescheduling() {
        let count = Arc::new(AtomicUsize::new(0));
        let sched = JobScheduler::new(vec![counting("hourly", hourly(), Arc::clone(&count))]);
        sched.start().await;

        sched.run_now("hourly").await.unwrap();
        wait_for(|| count.load(Ordering::SeqCst) == 1).await;

        let mut duration = None;
        for _ in 0..100 {
            duration = sched.status().await[0].last_duration_ms;
            if duration.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(duration.is_some());
        assert!(matches!(
            sched.run_now("missing").await,
            Err(Error::JobNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn slow_handler_does_not_block_next_firing() {
        let started = Arc::new(AtomicUsize::new(0));
        let def = {
            let started = Arc::clone(&started);
            JobDefinition::new(
                "slow",
                Recurrence::Every {
                    every_ms: 20,
                    anchor_ms: None,
                },
                move || {
                    let started = Arc::clone(&started);
                    async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(())
                    }
                },
            )
        };
        let sched = JobScheduler::new(vec![def]);
        sched.start().await;

        wait_for(|| started.load(Ordering::SeqCst) >= 3).await;
    }
}
