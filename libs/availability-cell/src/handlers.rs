use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use tracing::{error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthToken, User};
use shared_models::error::AppError;

use crate::models::{DoctorAvailability, SaveAvailabilityRequest, SlotQuery, SlotsResponse};
use crate::services::{resolve_slots, AvailabilityService};
use crate::services::schedule::AvailabilityError;

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidSchedule(msg) => AppError::BadRequest(msg),
            // A stored schedule that no longer parses is a data problem,
            // not a caller problem.
            AvailabilityError::Schedule(e) => {
                error!("Stored schedule is malformed: {}", e);
                AppError::Internal(e.to_string())
            }
            AvailabilityError::Store(e) => {
                error!("Store error: {}", e);
                AppError::Internal("Failed to access availability".to_string())
            }
        }
    }
}

pub async fn get_availability(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorAvailability>, AppError> {
    let service = AvailabilityService::new(&config);

    let availability = service
        .get_doctor_availability(doctor_id, None)
        .await?
        .ok_or_else(|| AppError::NotFound("Availability not configured".to_string()))?;

    Ok(Json(availability))
}

pub async fn save_availability(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Extension(token): Extension<AuthToken>,
    Path(doctor_id): Path<Uuid>,
    Json(request): Json<SaveAvailabilityRequest>,
) -> Result<Json<DoctorAvailability>, AppError> {
    if user.id != doctor_id.to_string() && !user.is_admin() {
        return Err(AppError::Forbidden(
            "You can only manage your own availability".to_string(),
        ));
    }

    let service = AvailabilityService::new(&config);
    let saved = service
        .save_doctor_availability(doctor_id, request, Some(token.as_str()))
        .await?;

    info!("Availability updated for doctor {}", doctor_id);
    Ok(Json(saved))
}

/// Public slot preview. An unconfigured doctor previews as an empty
/// day; only booking turns that into an error.
pub async fn get_slots(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotsResponse>, AppError> {
    let service = AvailabilityService::new(&config);

    let slots = match service.get_doctor_availability(doctor_id, None).await? {
        Some(availability) => resolve_slots(&availability, query.date, config.clinic_offset())
            .map_err(AvailabilityError::from)?,
        None => Vec::new(),
    };

    Ok(Json(SlotsResponse {
        doctor_id,
        date: query.date,
        slots,
    }))
}
