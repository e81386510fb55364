// libs/appointment-cell/src/services/consistency.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::DateRange;
use shared_utils::within;

use crate::models::{AppointmentError, AppointmentFilter, ConsistencyReport};
use crate::services::conflict::ConflictDetector;
use crate::services::repository::AppointmentRepository;

/// Audits stored data for double-booked providers. A non-empty report means
/// the store's booking path was bypassed.
pub struct SchedulingConsistencyService {
    repository: Arc<dyn AppointmentRepository>,
    timeout: Duration,
    max_range_days: i64,
}

impl SchedulingConsistencyService {
    pub fn new(repository: Arc<dyn AppointmentRepository>, config: &AppConfig) -> Self {
        Self {
            repository,
            timeout: config.store_timeout(),
            max_range_days: config.max_query_range_days,
        }
    }

    pub fn max_range_days(&self) -> i64 {
        self.max_range_days
    }

    pub async fn check_provider(&self, provider_id: Uuid, range: DateRange) -> Result<ConsistencyReport, AppointmentError> {
        let filter = AppointmentFilter::active_for_provider(provider_id, range.start_utc(), range.end_utc());
        let appointments = within(self.timeout, "appointment query", self.repository.query(&filter)).await??;

        let overlapping_pairs = ConflictDetector::find_overlapping_pairs(&appointments);
        let consistent = overlapping_pairs.is_empty();

        if consistent {
            info!(
                "Provider {} consistent over {}..={} ({} active appointments)",
                provider_id,
                range.from,
                range.to,
                appointments.len()
            );
        } else {
            error!(
                "Provider {} has {} overlapping appointment pairs in {}..={}",
                provider_id,
                overlapping_pairs.len(),
                range.from,
                range.to
            );
        }

        Ok(ConsistencyReport {
            provider_id,
            from: range.from,
            to: range.to,
            active_appointments: appointments.len(),
            overlapping_pairs,
            consistent,
        })
    }
}
