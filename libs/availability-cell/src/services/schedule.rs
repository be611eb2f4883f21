use reqwest::Method;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::store::{upsert_representation, StoreClient, StoreError};

use crate::models::{DoctorAvailability, SaveAvailabilityRequest, VALID_DAY_NAMES};
use crate::services::resolver::ScheduleError;

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads and writes doctor availability records.
pub struct AvailabilityService {
    store: StoreClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
        }
    }

    pub async fn get_doctor_availability(
        &self,
        doctor_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Option<DoctorAvailability>, AvailabilityError> {
        let path = format!("/rest/v1/doctor_availability?doctor_id=eq.{}", doctor_id);
        let mut records: Vec<DoctorAvailability> = self
            .store
            .request(Method::GET, &path, auth_token, None)
            .await?;

        if records.is_empty() {
            return Ok(None);
        }
        Ok(Some(records.remove(0)))
    }

    /// Replaces the doctor's availability wholesale. Partial day updates
    /// are not supported; the submitted schedule and overrides become
    /// the record.
    pub async fn save_doctor_availability(
        &self,
        doctor_id: Uuid,
        request: SaveAvailabilityRequest,
        auth_token: Option<&str>,
    ) -> Result<DoctorAvailability, AvailabilityError> {
        validate_schedule(&request)?;

        let body = json!({
            "doctor_id": doctor_id,
            "schedule": request.schedule,
            "overrides": request.overrides,
        });

        let path = "/rest/v1/doctor_availability?on_conflict=doctor_id";
        let mut saved: Vec<DoctorAvailability> = self
            .store
            .request_with_headers(
                Method::POST,
                path,
                auth_token,
                Some(body),
                Some(upsert_representation()),
            )
            .await?;

        if saved.is_empty() {
            return Err(AvailabilityError::Store(StoreError::Api {
                status: 500,
                body: "upsert returned no representation".to_string(),
            }));
        }

        info!("Saved availability for doctor {}", doctor_id);
        Ok(saved.remove(0))
    }
}

/// Rejects schedules that could never resolve to slots: unknown day
/// names, unparseable times, and inverted windows are caught at write
/// time rather than at first booking.
fn validate_schedule(request: &SaveAvailabilityRequest) -> Result<(), AvailabilityError> {
    for (day, window) in &request.schedule.0 {
        if !VALID_DAY_NAMES.contains(&day.as_str()) {
            return Err(AvailabilityError::InvalidSchedule(format!(
                "unknown day name '{}'",
                day
            )));
        }

        let start = parse_time(&window.start)?;
        let end = parse_time(&window.end)?;
        if start >= end {
            return Err(AvailabilityError::InvalidSchedule(format!(
                "{}: start {} must be before end {}",
                day, window.start, window.end
            )));
        }
    }
    Ok(())
}

fn parse_time(value: &str) -> Result<chrono::NaiveTime, AvailabilityError> {
    chrono::NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        AvailabilityError::InvalidSchedule(format!("invalid time '{}', expected HH:MM", value))
    })
}
