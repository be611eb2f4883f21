use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

use crate::models::DoctorAvailability;

/// Fixed appointment length. Every bookable slot is exactly this long.
pub const SLOT_MINUTES: i64 = 30;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid time '{0}' in schedule, expected HH:MM")]
    InvalidTime(String),
    #[error("schedule start '{start}' must be before end '{end}'")]
    InvalidRange { start: String, end: String },
}

fn parse_hhmm(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(value.to_string()))
}

/// The doctor's working window on `date` as a pair of UTC instants, or
/// `None` when the date is overridden or the weekday has no hours.
///
/// The window is interpreted in the clinic's civil timezone (`offset`)
/// and converted to UTC so all downstream comparisons are
/// offset-independent. A malformed or inverted window is an error, not
/// an empty day: silently dropping it would hide a broken schedule.
pub fn booking_window(
    availability: &DoctorAvailability,
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, ScheduleError> {
    if availability.overrides.contains(&date) {
        return Ok(None);
    }

    let day = match availability.schedule.day(date.weekday()) {
        Some(day) => day,
        None => return Ok(None),
    };

    let start_time = parse_hhmm(&day.start)?;
    let end_time = parse_hhmm(&day.end)?;
    if start_time >= end_time {
        return Err(ScheduleError::InvalidRange {
            start: day.start.clone(),
            end: day.end.clone(),
        });
    }

    let start = date
        .and_time(start_time)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| ScheduleError::InvalidTime(day.start.clone()))?
        .with_timezone(&Utc);
    let end = date
        .and_time(end_time)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| ScheduleError::InvalidTime(day.end.clone()))?
        .with_timezone(&Utc);

    Ok(Some((start, end)))
}

/// All bookable slot starts for `date`, ascending, in UTC.
///
/// Slots are walked from the window start in fixed 30-minute steps; a
/// slot is emitted only when the full appointment fits inside the
/// window, so a window like 09:00-10:45 yields 09:00, 09:30 and 10:00.
/// This is a pure function of its inputs.
pub fn resolve_slots(
    availability: &DoctorAvailability,
    date: NaiveDate,
    offset: FixedOffset,
) -> Result<Vec<DateTime<Utc>>, ScheduleError> {
    let (start, end) = match booking_window(availability, date, offset)? {
        Some(window) => window,
        None => return Ok(Vec::new()),
    };

    let step = Duration::minutes(SLOT_MINUTES);
    let mut slots = Vec::new();
    let mut cursor = start;
    while cursor + step <= end {
        slots.push(cursor);
        cursor += step;
    }

    Ok(slots)
}
