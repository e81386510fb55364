// libs/appointment-cell/src/handlers.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use availability_cell::Slot;
use shared_models::auth::CallerIdentity;
use shared_models::error::AppError;
use shared_models::DateRange;

use crate::models::{
    Appointment, AppointmentOwner, AppointmentPage, AppointmentQuery, AppointmentStatus, BookAppointmentRequest,
    ConflictCheckQuery, ConflictCheckResponse, ConsistencyQuery, ConsistencyReport, SlotQuery, TransitionsResponse,
    UpdateStatusRequest,
};
use crate::router::AppointmentState;

fn ensure_participant(caller: &CallerIdentity, appointment: &Appointment) -> Result<(), AppError> {
    if caller.is_admin() || appointment.involves(caller.id) {
        return Ok(());
    }

    warn!("Caller {} is not a participant of appointment {}", caller.id, appointment.id);
    Err(AppError::Forbidden("Not authorized to access this appointment".to_string()))
}

// ==============================================================================
// BOOKING & LIFECYCLE
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !caller.is_self_or_admin(request.subject_id) && !caller.can_manage_provider(request.provider_id) {
        return Err(AppError::Forbidden(
            "Not authorized to book appointments for this subject".to_string(),
        ));
    }

    let appointment = state.booking.book_appointment(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;
    ensure_participant(&caller, &appointment)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;
    ensure_participant(&caller, &appointment)?;

    // Subjects may only withdraw their own booking.
    let acts_for_provider = caller.is_admin() || caller.id == appointment.provider_id;
    if !acts_for_provider && request.status != AppointmentStatus::Cancelled {
        return Err(AppError::Forbidden(
            "Subjects can only cancel their appointments".to_string(),
        ));
    }

    let updated = state.booking.update_status(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated,
        "message": format!("Appointment is now {}", updated.status)
    })))
}

#[axum::debug_handler]
pub async fn get_valid_transitions(
    State(state): State<AppointmentState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<TransitionsResponse>, AppError> {
    let appointment = state.booking.get_appointment(appointment_id).await?;
    ensure_participant(&caller, &appointment)?;

    let transitions = state.booking.get_valid_transitions(appointment_id).await?;
    Ok(Json(transitions))
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<AppointmentPage>, AppError> {
    let owner_id = match query.owner()? {
        AppointmentOwner::Provider(id) | AppointmentOwner::Subject(id) => id,
    };
    if !caller.is_self_or_admin(owner_id) {
        return Err(AppError::Forbidden(
            "Not authorized to list these appointments".to_string(),
        ));
    }

    let page = state.booking.list_appointments(&query).await?;
    Ok(Json(page))
}

#[axum::debug_handler]
pub async fn list_slots(
    State(state): State<AppointmentState>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Vec<Slot>>, AppError> {
    let slots = state.slots.list_slots(query.provider_id, query.date).await?;
    Ok(Json(slots))
}

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(state): State<AppointmentState>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let response = state.slots.check_conflicts(&query).await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn check_scheduling_consistency(
    State(state): State<AppointmentState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<ConsistencyQuery>,
) -> Result<Json<ConsistencyReport>, AppError> {
    if !caller.can_manage_provider(query.provider_id) {
        return Err(AppError::Forbidden(
            "Only the provider or an admin can audit this schedule".to_string(),
        ));
    }

    let range = DateRange::bounded(query.from, query.to, state.consistency.max_range_days())
        .map_err(AppError::ValidationError)?;
    let report = state.consistency.check_provider(query.provider_id, range).await?;
    Ok(Json(report))
}
