use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use cache_cell::{InvalidationScope, ScheduleCache};
use shared_config::AppConfig;
use shared_database::StoreError;
use shared_models::DateRange;
use shared_utils::within;

use crate::models::{AvailabilityError, AvailabilityWindow, WindowRequest};
use crate::services::store::AvailabilityRepository;

pub struct AvailabilityService {
    repository: Arc<dyn AvailabilityRepository>,
    cache: Arc<ScheduleCache>,
    timeout: Duration,
    max_range_days: i64,
}

impl AvailabilityService {
    pub fn new(repository: Arc<dyn AvailabilityRepository>, cache: Arc<ScheduleCache>, config: &AppConfig) -> Self {
        Self {
            repository,
            cache,
            timeout: config.store_timeout(),
            max_range_days: config.max_query_range_days,
        }
    }

    pub fn max_range_days(&self) -> i64 {
        self.max_range_days
    }

    /// Create availability window for a provider
    #[instrument(skip(self, request))]
    pub async fn create_window(
        &self,
        provider_id: Uuid,
        request: WindowRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        request.validate()?;

        let now = Utc::now();
        let window = AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id,
            applies_to: request.applies_to,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration_minutes: request.slot_duration_minutes,
            breaks: request.sorted_breaks(),
            revision: 1,
            created_at: now,
            updated_at: now,
        };

        self.ensure_no_overlap(&window).await?;

        let created = within(self.timeout, "availability insert", self.repository.insert(window)).await??;
        self.cache
            .invalidate(provider_id, created.applies_to.invalidation_scope())
            .await?;

        info!("Availability window {} created for provider {}", created.id, provider_id);
        Ok(created)
    }

    /// Replace a window with a new revision
    #[instrument(skip(self, request))]
    pub async fn update_window(
        &self,
        provider_id: Uuid,
        window_id: Uuid,
        request: WindowRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        request.validate()?;

        let current = self.get_window(provider_id, window_id).await?;
        let replacement = AvailabilityWindow {
            applies_to: request.applies_to,
            start_time: request.start_time,
            end_time: request.end_time,
            slot_duration_minutes: request.slot_duration_minutes,
            breaks: request.sorted_breaks(),
            revision: current.revision + 1,
            updated_at: Utc::now(),
            ..current.clone()
        };

        self.ensure_no_overlap(&replacement).await?;

        let updated = within(self.timeout, "availability replace", self.repository.replace(replacement))
            .await?
            .map_err(|e| match e {
                StoreError::Conflict(msg) => AvailabilityError::Conflict(msg),
                other => AvailabilityError::Store(other),
            })?;

        for scope in Self::change_scopes(&current, &updated) {
            self.cache.invalidate(provider_id, scope).await?;
        }

        info!(
            "Availability window {} updated to revision {}",
            updated.id, updated.revision
        );
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_window(&self, provider_id: Uuid, window_id: Uuid) -> Result<(), AvailabilityError> {
        let current = self.get_window(provider_id, window_id).await?;

        within(self.timeout, "availability delete", self.repository.delete(window_id)).await??;
        self.cache
            .invalidate(provider_id, current.applies_to.invalidation_scope())
            .await?;

        info!("Availability window {} deleted", window_id);
        Ok(())
    }

    /// A window owned by another provider is reported as missing.
    pub async fn get_window(&self, provider_id: Uuid, window_id: Uuid) -> Result<AvailabilityWindow, AvailabilityError> {
        within(self.timeout, "availability get", self.repository.get(window_id))
            .await??
            .filter(|window| window.provider_id == provider_id)
            .ok_or(AvailabilityError::NotFound(window_id))
    }

    /// Windows applicable to any date in `range`, by start time then id.
    pub async fn list_windows(&self, provider_id: Uuid, range: &DateRange) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let mut windows: Vec<AvailabilityWindow> = self
            .load_provider_windows(provider_id)
            .await?
            .into_iter()
            .filter(|window| window.applies_to.applies_within(range))
            .collect();
        windows.sort_by_key(|window| (window.start_time, window.id));

        debug!(
            "Found {} windows for provider {} in {}..={}",
            windows.len(),
            provider_id,
            range.from,
            range.to
        );
        Ok(windows)
    }

    pub async fn windows_on(&self, provider_id: Uuid, date: NaiveDate) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        self.list_windows(provider_id, &DateRange::single(date)).await
    }

    async fn load_provider_windows(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        Ok(within(
            self.timeout,
            "availability list",
            self.repository.list_for_provider(provider_id),
        )
        .await??)
    }

    async fn ensure_no_overlap(&self, candidate: &AvailabilityWindow) -> Result<(), AvailabilityError> {
        let existing = self.load_provider_windows(candidate.provider_id).await?;

        if let Some(other) = existing.iter().find(|other| candidate.conflicts_with(other)) {
            warn!(
                "Rejected window for provider {}: overlaps window {}",
                candidate.provider_id, other.id
            );
            return Err(AvailabilityError::Validation(format!(
                "Window {}-{} overlaps existing window {} ({}-{})",
                candidate.start_time, candidate.end_time, other.id, other.start_time, other.end_time
            )));
        }

        Ok(())
    }

    fn change_scopes(before: &AvailabilityWindow, after: &AvailabilityWindow) -> Vec<InvalidationScope> {
        let old_scope = before.applies_to.invalidation_scope();
        let new_scope = after.applies_to.invalidation_scope();

        if old_scope == InvalidationScope::AllDates || new_scope == InvalidationScope::AllDates {
            return vec![InvalidationScope::AllDates];
        }

        if old_scope == new_scope {
            vec![new_scope]
        } else {
            vec![old_scope, new_scope]
        }
    }
}
