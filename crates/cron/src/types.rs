//! Core data types for the job scheduler.

use {
    chrono::Weekday,
    serde::{Deserialize, Serialize},
};

/// When a job fires. Every rule is evaluated in UTC unless a cron rule names
/// its own time zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Recurrence {
    /// Fixed interval. With an anchor, firings land on `anchor + k * every`;
    /// without one the interval counts from when the timer starts.
    Every {
        every_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        anchor_ms: Option<u64>,
    },
    /// Once a day at `hour:minute`.
    Daily { hour: u32, minute: u32 },
    /// Once a week on `weekday` at `hour:minute`.
    Weekly {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
    /// Cron expression (5-field standard or 6/7-field with seconds).
    Cron {
        expr: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tz: Option<String>,
    },
}

impl Recurrence {
    /// Every `hours` hours, aligned to midnight UTC.
    #[must_use]
    pub fn every_hours(hours: u32) -> Self {
        Self::Every {
            every_ms: u64::from(hours) * 60 * 60 * 1000,
            anchor_ms: Some(0),
        }
    }
}

/// Mutable runtime state of a registered job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    pub next_run_at_ms: Option<u64>,
    pub last_run_at_ms: Option<u64>,
    pub last_error: Option<String>,
    pub last_duration_ms: Option<u64>,
}

/// One entry of [`crate::service::JobScheduler::status`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub name: String,
    pub running: bool,
    pub recurrence: Recurrence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_duration_ms: Option<u64>,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurrence_serializes_tagged() {
        let r = Recurrence::Weekly {
            weekday: Weekday::Sun,
            hour: 2,
            minute: 0,
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["kind"], "weekly");
        assert_eq!(v["weekday"], "Sun");

        let back: Recurrence = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn every_hours_is_anchored_at_epoch() {
        assert_eq!(Recurrence::every_hours(6), Recurrence::Every {
            every_ms: 21_600_000,
            anchor_ms: Some(0),
        });
    }

    #[test]
    fn status_omits_empty_fields() {
        let s = JobStatus {
            name: "auto-sync-6h".into(),
            running: true,
            recurrence: Recurrence::every_hours(6),
            next_run_at_ms: None,
            last_run_at_ms: None,
            last_error: None,
            last_duration_ms: None,
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["running"], true);
        assert!(v.get("lastError").is_none());
        assert!(v.get("lastDurationMs").is_none());
    }
}
