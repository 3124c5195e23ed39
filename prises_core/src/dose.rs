//! Redose timing derived from a medication's `delay` hint.
//!
//! Shots are snapshots, not references, so the last intake of a medication
//! is found by display name.

use crate::{Medication, Shot};
use chrono::{DateTime, Duration, Utc};

/// Whether a medication may be taken again
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoseStatus {
    Ready,
    WaitUntil(DateTime<Utc>),
}

/// Most recent shot recorded under this medication's name
pub fn last_shot_of<'a>(
    medication: &Medication,
    shots: impl IntoIterator<Item = &'a Shot>,
) -> Option<&'a Shot> {
    shots
        .into_iter()
        .filter(|s| s.primary == medication.primary)
        .max_by_key(|s| s.ts)
}

/// Earliest instant the next dose respects the delay
///
/// `None` when the medication has no delay, was never taken, or the delay
/// overflows the calendar.
pub fn next_dose_at<'a>(
    medication: &Medication,
    shots: impl IntoIterator<Item = &'a Shot>,
) -> Option<DateTime<Utc>> {
    let delay = medication.delay.filter(|d| d.is_finite() && *d > 0.0)?;
    let last = last_shot_of(medication, shots)?.taken_at()?;
    let millis = (delay * 3_600_000.0).round();
    if millis >= i64::MAX as f64 {
        return None;
    }
    let wait = Duration::try_milliseconds(millis as i64)?;
    last.checked_add_signed(wait)
}

pub fn dose_status<'a>(
    medication: &Medication,
    shots: impl IntoIterator<Item = &'a Shot>,
    now: DateTime<Utc>,
) -> DoseStatus {
    match next_dose_at(medication, shots) {
        Some(next) if next > now => {
            tracing::debug!(
                "{} taken too recently ({} minutes to wait)",
                medication.primary,
                (next - now).num_minutes()
            );
            DoseStatus::WaitUntil(next)
        }
        _ => DoseStatus::Ready,
    }
}
