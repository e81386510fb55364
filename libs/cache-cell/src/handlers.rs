use std::sync::Arc;

use axum::{extract::State, Json};

use crate::models::CacheStats;
use crate::services::ScheduleCache;

#[axum::debug_handler]
pub async fn get_cache_stats(State(cache): State<Arc<ScheduleCache>>) -> Json<CacheStats> {
    Json(cache.stats())
}
