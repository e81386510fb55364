use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::{appointment_routes, AppointmentState};
use availability_cell::{availability_routes, AvailabilityService};
use cache_cell::{create_cache_router, ScheduleCache};

pub struct AppServices {
    pub availability: Arc<AvailabilityService>,
    pub appointments: AppointmentState,
    pub cache: Arc<ScheduleCache>,
}

pub fn create_router(services: AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Scheduling API is running!" }))
        .nest("/providers", availability_routes(services.availability))
        .nest("/appointments", appointment_routes(services.appointments))
        .nest("/cache", create_cache_router(services.cache))
}
