// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;

use crate::models::{
    AppointmentSearchQuery, AppointmentStatus, CancelAppointmentRequest,
    CreateAppointmentRequest, RescheduleAppointmentRequest, SchedulingError,
};
use crate::services::booking::AppointmentSchedulingService;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

fn to_app_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        SchedulingError::InvalidTime(msg) => AppError::BadRequest(msg),
        SchedulingError::ValidationError(msg) => AppError::BadRequest(msg),
        SchedulingError::ConflictDetected => {
            AppError::Conflict("Appointment slot conflicts with existing booking".to_string())
        }
        SchedulingError::InvalidStatusTransition(status) => AppError::Conflict(format!(
            "Appointment cannot be modified in current status: {}",
            status
        )),
        SchedulingError::DatabaseError(msg) => AppError::Database(msg),
    }
}

// ==============================================================================
// APPOINTMENT LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = service
        .create_appointment(request)
        .await
        .map_err(to_app_error)?;

    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .reschedule_appointment(appointment_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .cancel_appointment(appointment_id, request.reason)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .confirm_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn check_in_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .check_in_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn start_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .start_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .complete_appointment(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = service
        .mark_no_show(appointment_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// LISTING AND AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(service): State<Arc<AppointmentSchedulingService>>,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .get_upcoming_appointments()
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .search_appointments(query)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .get_patient_appointments(patient_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .get_doctor_appointments(doctor_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointments_by_status(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Path(status): Path<AppointmentStatus>,
) -> Result<Json<Value>, AppError> {
    let appointments = service
        .get_appointments_by_status(status)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn check_doctor_availability(
    State(service): State<Arc<AppointmentSchedulingService>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let available = service
        .is_doctor_available(
            query.doctor_id,
            query.start_time,
            query.end_time,
            query.exclude_appointment_id,
        )
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "available": available
    })))
}
