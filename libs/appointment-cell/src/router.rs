// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_utils::identity_middleware;

use crate::handlers;
use crate::services::{AppointmentBookingService, SchedulingConsistencyService, SlotService};

#[derive(Clone)]
pub struct AppointmentState {
    pub booking: Arc<AppointmentBookingService>,
    pub slots: Arc<SlotService>,
    pub consistency: Arc<SchedulingConsistencyService>,
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    Router::new()
        .route("/", get(handlers::list_appointments).post(handlers::book_appointment))
        .route("/slots", get(handlers::list_slots))
        .route("/conflicts/check", get(handlers::check_appointment_conflicts))
        .route("/consistency/check", get(handlers::check_scheduling_consistency))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/{appointment_id}/transitions", get(handlers::get_valid_transitions))
        .layer(middleware::from_fn(identity_middleware))
        .with_state(state)
}
