use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use availability_cell::services::ScheduleError;
use shared_database::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Rescheduled,
    Completed,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Rescheduled => write!(f, "rescheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

impl AppointmentStatus {
    /// Completed appointments are immutable except for rating.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub doctor_name: String,
    pub patient_name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub review_submitted: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub doctor_name: String,
    pub patient_name: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_id: Uuid,
    pub new_start_time: DateTime<Utc>,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CompleteAppointmentRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RateAppointmentRequest {
    pub rating: u8,
    #[serde(default)]
    pub review: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAppointmentsQuery {
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
}

/// Booking failures that callers can act on. Transient store trouble is
/// retried inside the transaction runner; everything surfacing here is
/// final.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("This doctor has not set up their availability yet")]
    NotConfigured,

    #[error("The selected time is outside the doctor's working hours")]
    OutsideWorkingHours,

    #[error("This time slot is already booked")]
    SlotConflict,

    /// Another request holds the slot lock. The transaction runner
    /// retries this; when retries run out it becomes `SlotConflict`.
    #[error("Slot is being booked by another request")]
    LockContended,

    #[error("Appointment not found")]
    NotFound,

    #[error("You are not allowed to modify this appointment")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("The doctor's schedule is invalid: {0}")]
    InvalidSchedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
