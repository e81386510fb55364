use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::CallerIdentity;
use shared_models::error::AppError;
use shared_models::DateRange;

use crate::models::{AvailabilityWindow, WindowRequest};
use crate::services::AvailabilityService;

#[derive(Debug, Deserialize)]
pub struct WindowRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

fn ensure_can_manage(caller: &CallerIdentity, provider_id: Uuid) -> Result<(), AppError> {
    if caller.can_manage_provider(provider_id) {
        return Ok(());
    }

    warn!("Caller {} may not manage availability of provider {}", caller.id, provider_id);
    Err(AppError::Forbidden(
        "Only the provider or an admin can change this schedule".to_string(),
    ))
}

#[axum::debug_handler]
pub async fn list_windows(
    State(service): State<Arc<AvailabilityService>>,
    Path(provider_id): Path<Uuid>,
    Query(query): Query<WindowRangeQuery>,
) -> Result<Json<Vec<AvailabilityWindow>>, AppError> {
    let range = DateRange::bounded(query.from, query.to, service.max_range_days()).map_err(AppError::ValidationError)?;

    let windows = service.list_windows(provider_id, &range).await?;
    Ok(Json(windows))
}

#[axum::debug_handler]
pub async fn get_window(
    State(service): State<Arc<AvailabilityService>>,
    Path((provider_id, window_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AvailabilityWindow>, AppError> {
    let window = service.get_window(provider_id, window_id).await?;
    Ok(Json(window))
}

#[axum::debug_handler]
pub async fn create_window(
    State(service): State<Arc<AvailabilityService>>,
    Extension(caller): Extension<CallerIdentity>,
    Path(provider_id): Path<Uuid>,
    Json(request): Json<WindowRequest>,
) -> Result<(StatusCode, Json<AvailabilityWindow>), AppError> {
    ensure_can_manage(&caller, provider_id)?;

    let window = service.create_window(provider_id, request).await?;
    Ok((StatusCode::CREATED, Json(window)))
}

#[axum::debug_handler]
pub async fn update_window(
    State(service): State<Arc<AvailabilityService>>,
    Extension(caller): Extension<CallerIdentity>,
    Path((provider_id, window_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<WindowRequest>,
) -> Result<Json<AvailabilityWindow>, AppError> {
    ensure_can_manage(&caller, provider_id)?;

    let window = service.update_window(provider_id, window_id, request).await?;
    Ok(Json(window))
}

#[axum::debug_handler]
pub async fn delete_window(
    State(service): State<Arc<AvailabilityService>>,
    Extension(caller): Extension<CallerIdentity>,
    Path((provider_id, window_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    ensure_can_manage(&caller, provider_id)?;

    service.delete_window(provider_id, window_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
