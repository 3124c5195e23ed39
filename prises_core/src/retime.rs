//! Correcting the time of a recorded shot.
//!
//! Two edit affordances with their own rules:
//! - time of day only: lands on today, or on yesterday when today's instant
//!   would be in the future (one-day rollback, nothing more)
//! - full date and time: taken as given; a future instant is refused

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, NaiveTime, TimeZone};
use std::str::FromStr;

const TIME_FORMATS: [&str; 2] = ["%H:%M", "%H:%M:%S"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// A requested new intake time, in local wall-clock terms
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetimeRequest {
    TimeOfDay(NaiveTime),
    DateTime(NaiveDateTime),
}

impl FromStr for RetimeRequest {
    type Err = Error;

    /// `HH:MM` for a time of day, `YYYY-MM-DDTHH:MM` for a full date and time
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(dt) = DATETIME_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        {
            return Ok(RetimeRequest::DateTime(dt));
        }
        if let Some(t) = TIME_FORMATS
            .iter()
            .find_map(|f| NaiveTime::parse_from_str(s, f).ok())
        {
            return Ok(RetimeRequest::TimeOfDay(t));
        }
        Err(Error::InvalidTime(format!(
            "expected HH:MM or YYYY-MM-DDTHH:MM, got {:?}",
            s
        )))
    }
}

impl RetimeRequest {
    /// Resolve to an instant, never later than `now`
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
        match *self {
            RetimeRequest::TimeOfDay(time) => resolve_time_of_day(time, now),
            RetimeRequest::DateTime(naive) => {
                let resolved = localize(&now.timezone(), naive)?;
                if resolved > *now {
                    return Err(Error::FutureTimestamp(naive.to_string()));
                }
                Ok(resolved)
            }
        }
    }
}

fn resolve_time_of_day<Tz: TimeZone>(time: NaiveTime, now: &DateTime<Tz>) -> Result<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let candidate = localize(&tz, today.and_time(time))?;
    if candidate <= *now {
        return Ok(candidate);
    }

    let yesterday = today
        .pred_opt()
        .ok_or_else(|| Error::InvalidTime(format!("no day before {}", today)))?;
    tracing::debug!("{} is after now, moving it to {}", time, yesterday);
    localize(&tz, yesterday.and_time(time))
}

/// Map a wall-clock time to an instant; ambiguous times take the earlier one
fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::InvalidTime(format!("{} does not exist in this time zone", naive)))
}
