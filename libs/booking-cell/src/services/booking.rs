use chrono::{DateTime, Duration, FixedOffset, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use availability_cell::services::{booking_window, SLOT_MINUTES};
use availability_cell::services::schedule::{AvailabilityError, AvailabilityService};
use shared_config::AppConfig;
use shared_database::store::{return_representation, StoreClient, StoreError};
use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingError,
    CompleteAppointmentRequest, ListAppointmentsQuery, RateAppointmentRequest,
    RescheduleAppointmentRequest,
};
use crate::services::slot_lock::{slot_lock_key, LockAcquisition, SlotLockService};
use crate::services::transaction::run_booking_transaction;

impl From<AvailabilityError> for BookingError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Schedule(e) => BookingError::InvalidSchedule(e),
            AvailabilityError::InvalidSchedule(msg) => BookingError::InvalidRequest(msg),
            AvailabilityError::Store(e) => BookingError::Store(e),
        }
    }
}

/// Books, reschedules and manages the lifecycle of appointments.
///
/// Every slot-taking write runs under an advisory slot lock and never
/// trusts a client-supplied slot list: the requested start is
/// re-validated against the doctor's working window, then checked for
/// conflicts, before the single appointment write happens.
pub struct BookingService {
    store: StoreClient,
    availability: AvailabilityService,
    clinic_offset: FixedOffset,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: StoreClient::new(config),
            availability: AvailabilityService::new(config),
            clinic_offset: config.clinic_offset(),
        }
    }

    pub async fn book_appointment(
        &self,
        request: &BookAppointmentRequest,
        caller: &User,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        if caller.id != request.patient_id.to_string() && !caller.is_doctor() && !caller.is_admin()
        {
            return Err(BookingError::Unauthorized);
        }

        run_booking_transaction("book_appointment", || {
            self.try_book(request, auth_token)
        })
        .await
    }

    async fn try_book(
        &self,
        request: &BookAppointmentRequest,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        let start = request.start_time;
        let end = start + Duration::minutes(SLOT_MINUTES);

        let lock_key = slot_lock_key(request.doctor_id, start);
        let locks = SlotLockService::new(&self.store);
        if locks.acquire(&lock_key, auth_token).await? == LockAcquisition::Contended {
            return Err(BookingError::LockContended);
        }

        let result = self.insert_appointment(request, start, end, auth_token).await;

        if let Err(release_err) = locks.release(&lock_key, auth_token).await {
            warn!("Failed to release slot lock {}: {}", lock_key, release_err);
        }

        result
    }

    async fn insert_appointment(
        &self,
        request: &BookAppointmentRequest,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        self.validate_slot(request.doctor_id, start, end, auth_token)
            .await?;
        self.check_conflicts(request.doctor_id, start, end, None, auth_token)
            .await?;

        let body = json!({
            "id": Uuid::new_v4(),
            "doctor_id": request.doctor_id,
            "patient_id": request.patient_id,
            "start_time": start,
            "end_time": end,
            "status": AppointmentStatus::Confirmed,
            "doctor_name": request.doctor_name,
            "patient_name": request.patient_name,
            "review_submitted": false,
            "created_at": Utc::now(),
        });

        let mut created: Vec<Appointment> = self
            .store
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                auth_token,
                Some(body),
                Some(return_representation()),
            )
            .await?;

        if created.is_empty() {
            return Err(BookingError::Store(StoreError::Api {
                status: 500,
                body: "insert returned no representation".to_string(),
            }));
        }

        let appointment = created.remove(0);
        info!(
            "Booked appointment {} for doctor {} at {}",
            appointment.id, appointment.doctor_id, appointment.start_time
        );
        Ok(appointment)
    }

    pub async fn reschedule_appointment(
        &self,
        request: &RescheduleAppointmentRequest,
        caller: &User,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        if caller.id != request.user_id.to_string() && !caller.is_admin() {
            return Err(BookingError::Unauthorized);
        }

        let appointment = self
            .get_appointment(request.appointment_id, auth_token)
            .await?;

        let is_participant = caller.id == appointment.patient_id.to_string()
            || caller.id == appointment.doctor_id.to_string();
        if !is_participant && !caller.is_admin() {
            return Err(BookingError::Unauthorized);
        }
        if !appointment.status.is_active() {
            return Err(BookingError::InvalidRequest(
                "Completed appointments cannot be rescheduled".to_string(),
            ));
        }

        run_booking_transaction("reschedule_appointment", || {
            // doctor_id never changes, so the lock key derived from
            // the initial read stays valid across retries.
            self.try_reschedule(
                appointment.id,
                appointment.doctor_id,
                request.new_start_time,
                auth_token,
            )
        })
        .await
    }

    async fn try_reschedule(
        &self,
        appointment_id: Uuid,
        doctor_id: Uuid,
        new_start: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        let new_end = new_start + Duration::minutes(SLOT_MINUTES);

        let lock_key = slot_lock_key(doctor_id, new_start);
        let locks = SlotLockService::new(&self.store);
        if locks.acquire(&lock_key, auth_token).await? == LockAcquisition::Contended {
            return Err(BookingError::LockContended);
        }

        let result = self
            .move_appointment(appointment_id, new_start, new_end, auth_token)
            .await;

        if let Err(release_err) = locks.release(&lock_key, auth_token).await {
            warn!("Failed to release slot lock {}: {}", lock_key, release_err);
        }

        result
    }

    async fn move_appointment(
        &self,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        // Reload under the lock: a completion that raced in since the
        // pre-flight read must win, not be overwritten back to
        // rescheduled.
        let current = self.get_appointment(appointment_id, auth_token).await?;
        if !current.status.is_active() {
            return Err(BookingError::InvalidRequest(
                "Completed appointments cannot be rescheduled".to_string(),
            ));
        }

        self.validate_slot(current.doctor_id, new_start, new_end, auth_token)
            .await?;

        // The appointment keeps its own current slot out of the
        // conflict check so it can move within it.
        self.check_conflicts(
            current.doctor_id,
            new_start,
            new_end,
            Some(current.id),
            auth_token,
        )
        .await?;

        let body = json!({
            "start_time": new_start,
            "end_time": new_end,
            "status": AppointmentStatus::Rescheduled,
            "updated_at": Utc::now(),
        });

        let updated = self.patch_appointment(current.id, body, auth_token).await?;
        info!(
            "Rescheduled appointment {} to {}",
            updated.id, updated.start_time
        );
        Ok(updated)
    }

    /// `NotConfigured` when the doctor has no availability record;
    /// `OutsideWorkingHours` when the slot does not fit the working
    /// window on that civil date or does not sit on the slot grid.
    async fn validate_slot(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        auth_token: Option<&str>,
    ) -> Result<(), BookingError> {
        let availability = self
            .availability
            .get_doctor_availability(doctor_id, auth_token)
            .await?
            .ok_or(BookingError::NotConfigured)?;

        let date = start.with_timezone(&self.clinic_offset).date_naive();
        let (window_start, window_end) =
            booking_window(&availability, date, self.clinic_offset)?
                .ok_or(BookingError::OutsideWorkingHours)?;

        if start < window_start || end > window_end {
            return Err(BookingError::OutsideWorkingHours);
        }
        // The conflict query only looks at slot starts inside the
        // requested interval, which is sound solely because every
        // stored start sits on the same grid. An off-grid start (say
        // 09:15 against a 09:00 booking) would slip past it, so grid
        // alignment is part of validity.
        if (start - window_start).num_seconds() % (SLOT_MINUTES * 60) != 0 {
            return Err(BookingError::OutsideWorkingHours);
        }
        Ok(())
    }

    /// Any appointment starting inside `[start, end)` for the doctor
    /// occupies the slot, regardless of status.
    async fn check_conflicts(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
        auth_token: Option<&str>,
    ) -> Result<(), BookingError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&start_time=gte.{}&start_time=lt.{}",
            doctor_id,
            urlencoding::encode(&start.to_rfc3339_opts(SecondsFormat::Secs, true)),
            urlencoding::encode(&end.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let conflicts: Vec<Appointment> = self
            .store
            .request(Method::GET, &path, auth_token, None)
            .await?;

        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(BookingError::SlotConflict)
        }
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut records: Vec<Appointment> = self
            .store
            .request(Method::GET, &path, auth_token, None)
            .await?;

        if records.is_empty() {
            return Err(BookingError::NotFound);
        }
        Ok(records.remove(0))
    }

    pub async fn list_appointments(
        &self,
        query: &ListAppointmentsQuery,
        caller: &User,
        auth_token: Option<&str>,
    ) -> Result<Vec<Appointment>, BookingError> {
        let filter = match (query.patient_id, query.doctor_id) {
            (Some(patient_id), None) => ("patient_id", patient_id),
            (None, Some(doctor_id)) => ("doctor_id", doctor_id),
            _ => {
                return Err(BookingError::InvalidRequest(
                    "Provide exactly one of patient_id or doctor_id".to_string(),
                ))
            }
        };

        if caller.id != filter.1.to_string() && !caller.is_admin() {
            return Err(BookingError::Unauthorized);
        }

        let path = format!(
            "/rest/v1/appointments?{}=eq.{}&order=start_time.asc",
            filter.0, filter.1
        );
        let records = self
            .store
            .request(Method::GET, &path, auth_token, None)
            .await?;
        Ok(records)
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        request: &CompleteAppointmentRequest,
        caller: &User,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if caller.id != appointment.doctor_id.to_string() && !caller.is_admin() {
            return Err(BookingError::Unauthorized);
        }
        if !appointment.status.is_active() {
            return Err(BookingError::InvalidRequest(
                "Appointment is already completed".to_string(),
            ));
        }

        let body = json!({
            "status": AppointmentStatus::Completed,
            "notes": request.notes,
            "updated_at": Utc::now(),
        });
        let updated = self.patch_appointment(appointment_id, body, auth_token).await?;
        info!("Completed appointment {}", appointment_id);
        Ok(updated)
    }

    pub async fn rate_appointment(
        &self,
        appointment_id: Uuid,
        request: &RateAppointmentRequest,
        caller: &User,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        if !(1..=5).contains(&request.rating) {
            return Err(BookingError::InvalidRequest(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let appointment = self.get_appointment(appointment_id, auth_token).await?;

        if caller.id != appointment.patient_id.to_string() {
            return Err(BookingError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(BookingError::InvalidRequest(
                "Only completed appointments can be rated".to_string(),
            ));
        }
        if appointment.review_submitted {
            return Err(BookingError::InvalidRequest(
                "This appointment has already been rated".to_string(),
            ));
        }

        let body = json!({
            "rating": request.rating,
            "review": request.review,
            "review_submitted": true,
            "updated_at": Utc::now(),
        });
        let updated = self.patch_appointment(appointment_id, body, auth_token).await?;
        info!("Rated appointment {}", appointment_id);
        Ok(updated)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: serde_json::Value,
        auth_token: Option<&str>,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut updated: Vec<Appointment> = self
            .store
            .request_with_headers(
                Method::PATCH,
                &path,
                auth_token,
                Some(body),
                Some(return_representation()),
            )
            .await?;

        if updated.is_empty() {
            return Err(BookingError::NotFound);
        }
        Ok(updated.remove(0))
    }
}
