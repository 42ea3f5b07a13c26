//! Next-run computation for all recurrence kinds.

use {
    chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday},
    cron::Schedule,
};

use crate::{Error, Result, types::Recurrence};

/// Compute the next fire time (epoch millis) strictly after `now_ms`.
///
/// Returns `None` if the rule has no future firings.
pub fn compute_next_run(recurrence: &Recurrence, now_ms: u64) -> Result<Option<u64>> {
    match recurrence {
        Recurrence::Every {
            every_ms,
            anchor_ms,
        } => {
            if *every_ms == 0 {
                return Err(Error::message("every_ms must be > 0"));
            }
            let anchor = anchor_ms.unwrap_or(now_ms);
            if anchor > now_ms {
                Ok(Some(anchor))
            } else {
                let intervals = (now_ms - anchor) / every_ms;
                Ok(Some(anchor + (intervals + 1) * every_ms))
            }
        },
        Recurrence::Daily { hour, minute } => {
            next_wall_clock(now_ms, *hour, *minute, None).map(Some)
        },
        Recurrence::Weekly {
            weekday,
            hour,
            minute,
        } => next_wall_clock(now_ms, *hour, *minute, Some(*weekday)).map(Some),
        Recurrence::Cron { expr, tz } => {
            let schedule: Schedule = expr.parse().or_else(|_| {
                // The `cron` crate wants seconds and year; pad 5-field input.
                format!("0 {expr} *").parse::<Schedule>()
            })?;

            let now_dt = utc(now_ms)?;
            let next = match tz {
                Some(tz_name) => {
                    let tz: chrono_tz::Tz = tz_name
                        .parse()
                        .map_err(|_| Error::unknown_timezone(tz_name))?;
                    schedule
                        .after(&now_dt.with_timezone(&tz))
                        .next()
                        .map(|dt| dt.timestamp_millis() as u64)
                },
                None => schedule
                    .after(&now_dt)
                    .next()
                    .map(|dt| dt.timestamp_millis() as u64),
            };
            Ok(next)
        },
    }
}

fn utc(ms: u64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms as i64)
        .ok_or_else(|| Error::message(format!("timestamp out of range: {ms}")))
}

/// First `hour:minute` UTC after `now_ms`, optionally restricted to a weekday.
fn next_wall_clock(now_ms: u64, hour: u32, minute: u32, weekday: Option<Weekday>) -> Result<u64> {
    let time =
        NaiveTime::from_hms_opt(hour, minute, 0).ok_or(Error::InvalidTime { hour, minute })?;
    let now = utc(now_ms)?;
    let mut date = now.date_naive();

    // Today plus a full week covers every weekday.
    for _ in 0..8 {
        let candidate = date.and_time(time).and_utc();
        if candidate > now && weekday.is_none_or(|w| candidate.weekday() == w) {
            return Ok(candidate.timestamp_millis() as u64);
        }
        date = date
            .succ_opt()
            .ok_or_else(|| Error::message("date out of range"))?;
    }
    Err(Error::message("no matching day within a week"))
}
