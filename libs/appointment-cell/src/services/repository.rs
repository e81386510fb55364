use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_database::{StoreError, SupabaseClient};

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus};
use crate::services::conflict::{BookingCandidate, ConflictDetector};

const APPOINTMENTS_TABLE: &str = "/rest/v1/appointments";
const BOOK_RPC: &str = "/rest/v1/rpc/book_appointment";

#[derive(Debug, Clone, PartialEq)]
pub enum BookOutcome {
    Booked(Appointment),
    /// Nothing was written; the ids are ordered by start, then id.
    Conflict(Vec<Uuid>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Updated(Appointment),
    /// The stored version differs from the expected one.
    VersionMismatch(Appointment),
    NotFound,
}

/// Durable store for appointments.
///
/// `book` is the single serialization point for the no-overlap invariant:
/// the conflict re-check and the insert happen in one atomic step of the
/// backing store, never in process memory shared only by one instance.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    async fn book(&self, appointment: Appointment) -> Result<BookOutcome, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Sets `status` and bumps the version, only if the stored version is `expected_version`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected_version: i64,
        status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError>;

    async fn query(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Single-process store. The mutex is the transaction boundary.
#[derive(Default)]
pub struct InMemoryAppointmentRepository {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    #[instrument(skip(self, appointment), fields(provider_id = %appointment.provider_id))]
    async fn book(&self, appointment: Appointment) -> Result<BookOutcome, StoreError> {
        let mut appointments = self.appointments.lock().await;

        let candidate = BookingCandidate::from(&appointment);
        let relevant: Vec<Appointment> = appointments
            .values()
            .filter(|other| other.provider_id == appointment.provider_id || other.subject_id == appointment.subject_id)
            .cloned()
            .collect();

        let conflicts = ConflictDetector::find_conflicts(&candidate, &relevant);
        if !conflicts.is_empty() {
            return Ok(BookOutcome::Conflict(conflicts));
        }

        if appointments.contains_key(&appointment.id) {
            return Err(StoreError::Conflict(format!("appointment {} already exists", appointment.id)));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(BookOutcome::Booked(appointment))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.appointments.lock().await.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected_version: i64,
        status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError> {
        let mut appointments = self.appointments.lock().await;

        let Some(stored) = appointments.get_mut(&id) else {
            return Ok(StatusChange::NotFound);
        };

        if stored.version != expected_version {
            return Ok(StatusChange::VersionMismatch(stored.clone()));
        }

        stored.status = status;
        stored.version += 1;
        stored.updated_at = updated_at;
        Ok(StatusChange::Updated(stored.clone()))
    }

    async fn query(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.lock().await;

        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| filter.matches(appointment))
            .cloned()
            .collect();
        matching.sort_by_key(|appointment| (appointment.start_time, appointment.id));

        let page = matching
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(page)
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

#[derive(Debug, Deserialize)]
struct BookRpcResult {
    booked: bool,
    appointment: Option<Appointment>,
    #[serde(default)]
    conflicting_ids: Vec<Uuid>,
}

/// Appointments in Postgres through PostgREST. Booking runs the
/// `book_appointment` function, which locks the provider's and subject's
/// rows and checks and inserts in one transaction.
pub struct SupabaseAppointmentRepository {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentRepository {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    fn timestamp(value: DateTime<Utc>) -> String {
        urlencoding::encode(&value.to_rfc3339()).into_owned()
    }

    fn query_path(filter: &AppointmentFilter) -> String {
        let mut params = vec![
            format!("start_time=lt.{}", Self::timestamp(filter.end)),
            format!("end_time=gt.{}", Self::timestamp(filter.start)),
        ];

        if let Some(provider_id) = filter.provider_id {
            params.push(format!("provider_id=eq.{}", provider_id));
        }
        if let Some(subject_id) = filter.subject_id {
            params.push(format!("subject_id=eq.{}", subject_id));
        }

        match (filter.status, filter.active_only) {
            (Some(status), _) => params.push(format!("status=eq.{}", status)),
            (None, true) => {
                let active: Vec<String> = AppointmentStatus::ACTIVE.iter().map(|s| s.to_string()).collect();
                params.push(format!("status=in.({})", active.join(",")));
            }
            (None, false) => {}
        }

        params.push("order=start_time.asc,id.asc".to_string());
        if let Some(limit) = filter.limit {
            params.push(format!("limit={}", limit));
        }
        if filter.offset > 0 {
            params.push(format!("offset={}", filter.offset));
        }

        format!("{}?{}", APPOINTMENTS_TABLE, params.join("&"))
    }
}

#[async_trait]
impl AppointmentRepository for SupabaseAppointmentRepository {
    #[instrument(skip(self, appointment), fields(provider_id = %appointment.provider_id))]
    async fn book(&self, appointment: Appointment) -> Result<BookOutcome, StoreError> {
        let body = json!({
            "p_id": appointment.id,
            "p_provider_id": appointment.provider_id,
            "p_subject_id": appointment.subject_id,
            "p_start_time": appointment.start_time,
            "p_end_time": appointment.end_time,
            "p_status": appointment.status,
            "p_kind": appointment.kind,
            "p_notes": appointment.notes,
        });

        let result: BookRpcResult = self.supabase.request(Method::POST, BOOK_RPC, Some(body)).await?;

        match (result.booked, result.appointment) {
            (true, Some(booked)) => {
                info!("Store committed appointment {}", booked.id);
                Ok(BookOutcome::Booked(booked))
            }
            (true, None) => Err(StoreError::Decode(
                "book_appointment reported success without a row".to_string(),
            )),
            (false, _) => {
                warn!(
                    "Store rejected appointment {}: {} conflict(s)",
                    appointment.id,
                    result.conflicting_ids.len()
                );
                Ok(BookOutcome::Conflict(result.conflicting_ids))
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_TABLE, id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected_version: i64,
        status: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusChange, StoreError> {
        let path = format!("{}?id=eq.{}&version=eq.{}", APPOINTMENTS_TABLE, id, expected_version);
        let body = json!({
            "status": status,
            "version": expected_version + 1,
            "updated_at": updated_at,
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if let Some(row) = rows.into_iter().next() {
            return Ok(StatusChange::Updated(serde_json::from_value(row)?));
        }

        // Nothing matched: either the row is gone or its version moved on.
        debug!("Conditional status update of {} matched no rows", id);
        Ok(match self.get(id).await? {
            Some(current) => StatusChange::VersionMismatch(current),
            None => StatusChange::NotFound,
        })
    }

    async fn query(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let path = Self::query_path(filter);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        let appointments = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()?;

        debug!("Store returned {} appointments", appointments.len());
        Ok(appointments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_path_encodes_filters() {
        let provider = Uuid::new_v4();
        let filter = AppointmentFilter {
            limit: Some(51),
            offset: 50,
            ..AppointmentFilter::active_for_provider(
                provider,
                Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap(),
            )
        };

        let path = SupabaseAppointmentRepository::query_path(&filter);

        assert!(path.starts_with("/rest/v1/appointments?start_time=lt.2025-03-04T00%3A00%3A00%2B00%3A00"));
        assert!(path.contains(&format!("provider_id=eq.{}", provider)));
        assert!(path.contains("status=in.(requested,confirmed,checked_in)"));
        assert!(path.ends_with("order=start_time.asc,id.asc&limit=51&offset=50"));
    }
}
