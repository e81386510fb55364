use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, instrument};
use uuid::Uuid;

use availability_cell::{AvailabilityService, BusyInterval, Slot, SlotGenerator};
use cache_cell::{CacheKey, ScheduleCache};
use shared_config::AppConfig;
use shared_models::DateRange;
use shared_utils::within;

use crate::models::{AppointmentError, AppointmentFilter, ConflictCheckQuery, ConflictCheckResponse};
use crate::services::conflict::{BookingCandidate, ConflictDetector};
use crate::services::repository::AppointmentRepository;

/// Read side of the schedule: bookable slots and conflict previews.
pub struct SlotService {
    availability: Arc<AvailabilityService>,
    repository: Arc<dyn AppointmentRepository>,
    cache: Arc<ScheduleCache>,
    timeout: Duration,
}

impl SlotService {
    pub fn new(
        availability: Arc<AvailabilityService>,
        repository: Arc<dyn AppointmentRepository>,
        cache: Arc<ScheduleCache>,
        config: &AppConfig,
    ) -> Self {
        Self {
            availability,
            repository,
            cache,
            timeout: config.store_timeout(),
        }
    }

    /// Ordered bookable slots for a provider on a date.
    #[instrument(skip(self))]
    pub async fn list_slots(&self, provider_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let key = CacheKey::slots(provider_id, date);
        self.cache
            .get_or_load(&key, || self.compute_slots(provider_id, date))
            .await
    }

    async fn compute_slots(&self, provider_id: Uuid, date: NaiveDate) -> Result<Vec<Slot>, AppointmentError> {
        let windows = self.availability.windows_on(provider_id, date).await?;
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let day = DateRange::single(date);
        let filter = AppointmentFilter::active_for_provider(provider_id, day.start_utc(), day.end_utc());
        let busy: Vec<BusyInterval> = within(self.timeout, "appointment query", self.repository.query(&filter))
            .await??
            .iter()
            .map(|appointment| BusyInterval::new(appointment.start_time, appointment.end_time))
            .collect();

        let slots: Vec<Slot> = SlotGenerator::new(provider_id, date, &windows, &busy).slots().collect();

        debug!(
            "Computed {} slots for provider {} on {} ({} windows, {} busy)",
            slots.len(),
            provider_id,
            date,
            windows.len(),
            busy.len()
        );
        Ok(slots)
    }

    /// Runs the conflict detector against current data without writing anything.
    pub async fn check_conflicts(&self, query: &ConflictCheckQuery) -> Result<ConflictCheckResponse, AppointmentError> {
        if query.start_time >= query.end_time {
            return Err(AppointmentError::Validation(
                "Start time must be before end time".to_string(),
            ));
        }

        let mut existing = within(
            self.timeout,
            "appointment query",
            self.repository.query(&AppointmentFilter::active_for_provider(
                query.provider_id,
                query.start_time,
                query.end_time,
            )),
        )
        .await??;

        if let Some(subject_id) = query.subject_id {
            let subject_filter = AppointmentFilter::active_for_subject(subject_id, query.start_time, query.end_time);
            existing.extend(within(self.timeout, "appointment query", self.repository.query(&subject_filter)).await??);
        }

        let candidate = BookingCandidate {
            id: None,
            provider_id: query.provider_id,
            subject_id: query.subject_id,
            start_time: query.start_time,
            end_time: query.end_time,
        };
        let conflicts = ConflictDetector::detect(&candidate, &existing);

        Ok(ConflictCheckResponse {
            has_conflict: !conflicts.is_empty(),
            conflicting_ids: conflicts.iter().map(|conflict| conflict.appointment_id).collect(),
            conflicts,
        })
    }
}
