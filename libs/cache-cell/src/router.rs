use std::sync::Arc;

use axum::{routing::get, Router};

use crate::handlers;
use crate::services::ScheduleCache;

pub fn create_cache_router(cache: Arc<ScheduleCache>) -> Router {
    Router::new()
        .route("/stats", get(handlers::get_cache_stats))
        .with_state(cache)
}
