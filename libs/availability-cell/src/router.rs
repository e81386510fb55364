use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_utils::identity_middleware;

use crate::handlers;
use crate::services::AvailabilityService;

pub fn availability_routes(service: Arc<AvailabilityService>) -> Router {
    Router::new()
        .route(
            "/{provider_id}/availability",
            get(handlers::list_windows).post(handlers::create_window),
        )
        .route(
            "/{provider_id}/availability/{window_id}",
            get(handlers::get_window)
                .put(handlers::update_window)
                .delete(handlers::delete_window),
        )
        .layer(middleware::from_fn(identity_middleware))
        .with_state(service)
}
