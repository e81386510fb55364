// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use cache_cell::{CacheKey, InvalidationScope, ScheduleCache};
use shared_config::AppConfig;
use shared_models::DateRange;
use shared_utils::within;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentOwner, AppointmentPage, AppointmentQuery,
    AppointmentStatus, BookAppointmentRequest, TransitionsResponse, UpdateStatusRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::repository::{AppointmentRepository, BookOutcome, StatusChange};

#[derive(Debug, Clone, Copy)]
struct PagingRules {
    default_page_size: u32,
    max_page_size: u32,
    max_range_days: i64,
}

pub struct AppointmentBookingService {
    repository: Arc<dyn AppointmentRepository>,
    cache: Arc<ScheduleCache>,
    lifecycle_service: AppointmentLifecycleService,
    timeout: Duration,
    paging: PagingRules,
}

impl AppointmentBookingService {
    pub fn new(repository: Arc<dyn AppointmentRepository>, cache: Arc<ScheduleCache>, config: &AppConfig) -> Self {
        Self {
            repository,
            cache,
            lifecycle_service: AppointmentLifecycleService::new(config.auto_confirm_bookings),
            timeout: config.store_timeout(),
            paging: PagingRules {
                default_page_size: config.default_page_size.max(1),
                max_page_size: config.max_page_size.max(1),
                max_range_days: config.max_query_range_days,
            },
        }
    }

    /// Book an appointment. The store re-validates conflicts atomically with
    /// the insert; a deadline hit leaves the outcome unknown to the caller.
    #[instrument(skip(self, request), fields(provider_id = %request.provider_id, subject_id = %request.subject_id))]
    pub async fn book_appointment(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        request.validate()?;

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            provider_id: request.provider_id,
            subject_id: request.subject_id,
            start_time: request.start_time,
            end_time: request.end_time,
            status: self.lifecycle_service.initial_status(),
            kind: request.kind,
            version: 1,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        debug!(
            "Booking appointment {} from {} to {}",
            appointment.id, appointment.start_time, appointment.end_time
        );

        match within(self.timeout, "appointment booking", self.repository.book(appointment)).await?? {
            BookOutcome::Booked(booked) => {
                self.invalidate_for(&booked).await?;
                info!(
                    "Appointment {} booked for provider {} ({})",
                    booked.id, booked.provider_id, booked.status
                );
                Ok(booked)
            }
            BookOutcome::Conflict(conflicting_ids) => {
                warn!(
                    "Booking rejected for provider {}: conflicts with {:?}",
                    request.provider_id, conflicting_ids
                );
                Err(AppointmentError::ScheduleConflict(conflicting_ids))
            }
        }
    }

    /// Move an appointment to `request.status` if it is still at `request.expected_version`.
    #[instrument(skip(self, request), fields(status = %request.status, expected_version = request.expected_version))]
    pub async fn update_status(
        &self,
        appointment_id: Uuid,
        request: UpdateStatusRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id).await?;

        // Terminal states reject every transition, whatever version the caller holds.
        self.lifecycle_service
            .validate_status_transition(current.status, request.status)?;

        if current.version != request.expected_version {
            warn!(
                "Version conflict on appointment {}: expected {}, stored {}",
                appointment_id, request.expected_version, current.version
            );
            return Err(AppointmentError::VersionConflict {
                expected: request.expected_version,
                current: current.version,
            });
        }

        let change = within(
            self.timeout,
            "appointment status update",
            self.repository.compare_and_set_status(
                appointment_id,
                request.expected_version,
                request.status,
                Utc::now(),
            ),
        )
        .await??;

        match change {
            StatusChange::Updated(updated) => {
                self.invalidate_for(&updated).await?;
                info!(
                    "Appointment {} moved {} -> {} (version {})",
                    updated.id, current.status, updated.status, updated.version
                );
                Ok(updated)
            }
            StatusChange::VersionMismatch(stored) => {
                warn!(
                    "Version conflict on appointment {}: expected {}, stored {}",
                    appointment_id, request.expected_version, stored.version
                );
                Err(AppointmentError::VersionConflict {
                    expected: request.expected_version,
                    current: stored.version,
                })
            }
            StatusChange::NotFound => Err(AppointmentError::NotFound(appointment_id)),
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        within(self.timeout, "appointment get", self.repository.get(appointment_id))
            .await??
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn get_valid_transitions(&self, appointment_id: Uuid) -> Result<TransitionsResponse, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;

        Ok(TransitionsResponse {
            appointment_id,
            status: appointment.status,
            version: appointment.version,
            valid_transitions: self.lifecycle_service.get_valid_transitions(appointment.status),
        })
    }

    /// Appointments overlapping the query's dates, ordered by start time.
    /// Provider-scoped pages are served through the schedule cache.
    pub async fn list_appointments(&self, query: &AppointmentQuery) -> Result<AppointmentPage, AppointmentError> {
        let owner = query.owner()?;
        let range = DateRange::bounded(query.from, query.to, self.paging.max_range_days)
            .map_err(AppointmentError::Validation)?;

        let limit = query
            .limit
            .unwrap_or(self.paging.default_page_size)
            .clamp(1, self.paging.max_page_size);
        let offset = query.offset.unwrap_or(0);

        match owner {
            AppointmentOwner::Provider(provider_id) => {
                let variant = format!(
                    "status={}:limit={}:offset={}",
                    query.status.map_or_else(|| "all".to_string(), |status| status.to_string()),
                    limit,
                    offset
                );
                let key = CacheKey::range(provider_id, range, variant);
                self.cache
                    .get_or_load(&key, || self.load_page(owner, range, query.status, limit, offset))
                    .await
            }
            AppointmentOwner::Subject(_) => self.load_page(owner, range, query.status, limit, offset).await,
        }
    }

    async fn load_page(
        &self,
        owner: AppointmentOwner,
        range: DateRange,
        status: Option<AppointmentStatus>,
        limit: u32,
        offset: u32,
    ) -> Result<AppointmentPage, AppointmentError> {
        let (provider_id, subject_id) = match owner {
            AppointmentOwner::Provider(id) => (Some(id), None),
            AppointmentOwner::Subject(id) => (None, Some(id)),
        };

        // One extra row tells whether another page exists.
        let filter = AppointmentFilter {
            provider_id,
            subject_id,
            start: range.start_utc(),
            end: range.end_utc(),
            status,
            active_only: false,
            limit: Some(limit as usize + 1),
            offset: offset as usize,
        };

        let mut appointments = within(self.timeout, "appointment query", self.repository.query(&filter)).await??;
        let has_more = appointments.len() > limit as usize;
        appointments.truncate(limit as usize);

        debug!(
            "Loaded {} appointments for {:?} in {}..={}",
            appointments.len(),
            owner,
            range.from,
            range.to
        );

        Ok(AppointmentPage {
            appointments,
            limit,
            offset,
            has_more,
        })
    }

    async fn invalidate_for(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        self.cache
            .invalidate(appointment.provider_id, InvalidationScope::Dates(appointment.dates()))
            .await
            .map_err(|e| {
                warn!(
                    "Appointment {} committed but cache invalidation failed: {}",
                    appointment.id, e
                );
                AppointmentError::from(e)
            })?;
        Ok(())
    }
}
