use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::error;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthToken, User};
use shared_models::error::AppError;

use crate::models::{
    Appointment, BookAppointmentRequest, BookingError, CompleteAppointmentRequest,
    ListAppointmentsQuery, RateAppointmentRequest, RescheduleAppointmentRequest,
};
use crate::services::BookingService;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::SlotConflict | BookingError::LockContended => {
                AppError::Conflict(err.to_string())
            }
            BookingError::NotConfigured
            | BookingError::OutsideWorkingHours
            | BookingError::NotFound => AppError::BadRequest(err.to_string()),
            BookingError::Unauthorized => AppError::Forbidden(err.to_string()),
            BookingError::InvalidRequest(msg) => AppError::BadRequest(msg),
            BookingError::InvalidSchedule(e) => {
                error!("Schedule data fault during booking: {}", e);
                AppError::Internal("The doctor's schedule could not be applied".to_string())
            }
            BookingError::Store(e) => {
                error!("Store error during booking: {}", e);
                AppError::Internal("Failed to process the appointment".to_string())
            }
        }
    }
}

pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Appointment>), AppError> {
    let service = BookingService::new(&config);
    let appointment = service
        .book_appointment(&request, &user, Some(token.as_str()))
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

pub async fn reschedule_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(&config);
    let appointment = service
        .reschedule_appointment(&request, &user, Some(token.as_str()))
        .await?;
    Ok(Json(appointment))
}

pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let service = BookingService::new(&config);
    let appointments = service
        .list_appointments(&query, &user, Some(token.as_str()))
        .await?;
    Ok(Json(appointments))
}

pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(&config);
    // A read of a missing resource is a plain 404, unlike the booking
    // bodies where an unknown id is a bad request.
    let appointment = match service
        .get_appointment(appointment_id, Some(token.as_str()))
        .await
    {
        Ok(appointment) => appointment,
        Err(BookingError::NotFound) => {
            return Err(AppError::NotFound("Appointment not found".to_string()))
        }
        Err(err) => return Err(err.into()),
    };

    let is_participant = user.id == appointment.patient_id.to_string()
        || user.id == appointment.doctor_id.to_string();
    if !is_participant && !user.is_admin() {
        return Err(AppError::Forbidden(
            "You are not a participant in this appointment".to_string(),
        ));
    }

    Ok(Json(appointment))
}

pub async fn complete_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(&config);
    let appointment = service
        .complete_appointment(appointment_id, &request, &user, Some(token.as_str()))
        .await?;
    Ok(Json(appointment))
}

pub async fn rate_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let service = BookingService::new(&config);
    let appointment = service
        .rate_appointment(appointment_id, &request, &user, Some(token.as_str()))
        .await?;
    Ok(Json(appointment))
}
