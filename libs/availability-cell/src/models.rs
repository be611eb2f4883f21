use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single day's working window in the clinic's civil timezone,
/// stored as "HH:MM" strings exactly as the dashboard submits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub start: String,
    pub end: String,
}

/// Weekly working hours keyed by lowercase day name. Days with no
/// entry are non-working days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklySchedule(pub BTreeMap<String, DaySchedule>);

impl WeeklySchedule {
    pub fn day(&self, weekday: Weekday) -> Option<&DaySchedule> {
        self.0.get(day_name(weekday))
    }
}

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub const VALID_DAY_NAMES: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// A doctor's availability configuration: recurring weekly hours plus
/// whole-day unavailability overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorAvailability {
    pub doctor_id: Uuid,
    pub schedule: WeeklySchedule,
    #[serde(default)]
    pub overrides: BTreeSet<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SaveAvailabilityRequest {
    pub schedule: WeeklySchedule,
    #[serde(default)]
    pub overrides: BTreeSet<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<chrono::DateTime<chrono::Utc>>,
}
