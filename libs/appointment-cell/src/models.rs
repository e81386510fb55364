// libs/appointment-cell/src/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use availability_cell::AvailabilityError;
use cache_cell::CacheError;
use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::DateRange;
use shared_utils::DeadlineExceeded;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub kind: AppointmentKind,
    pub version: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Half-open `[start, end)` overlap.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }

    /// Calendar dates this appointment occupies.
    pub fn dates(&self) -> DateRange {
        DateRange::covering(self.start_time, self.end_time)
    }

    pub fn involves(&self, caller_id: Uuid) -> bool {
        self.provider_id == caller_id || self.subject_id == caller_id
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Requested,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Active appointments hold their interval on the provider's calendar.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Requested | AppointmentStatus::Confirmed | AppointmentStatus::CheckedIn
        )
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::Requested,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
    ];
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "requested"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CheckedIn => write!(f, "checked_in"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    #[serde(alias = "initial", alias = "new_patient")]
    InitialConsultation,

    #[default]
    #[serde(alias = "followup", alias = "follow_up_consultation")]
    FollowUp,

    #[serde(alias = "emergency")]
    Urgent,

    #[serde(alias = "telehealth_checkin", alias = "virtual")]
    Telehealth,

    Procedure,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_id: Uuid,
    pub subject_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub kind: AppointmentKind,
    pub notes: Option<String>,
}

impl BookAppointmentRequest {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        if self.start_time >= self.end_time {
            return Err(AppointmentError::Validation(
                "Appointment start time must be before end time".to_string(),
            ));
        }

        if self.provider_id == self.subject_id {
            return Err(AppointmentError::Validation(
                "A provider cannot book an appointment with themselves".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
    pub expected_version: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentQuery {
    pub provider_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Whose calendar a listing reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentOwner {
    Provider(Uuid),
    Subject(Uuid),
}

impl AppointmentQuery {
    pub fn owner(&self) -> Result<AppointmentOwner, AppointmentError> {
        match (self.provider_id, self.subject_id) {
            (Some(provider_id), None) => Ok(AppointmentOwner::Provider(provider_id)),
            (None, Some(subject_id)) => Ok(AppointmentOwner::Subject(subject_id)),
            _ => Err(AppointmentError::Validation(
                "Exactly one of provider_id or subject_id is required".to_string(),
            )),
        }
    }
}

/// Store-level filter. Results overlap `[start, end)` and are ordered by start, then id.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentFilter {
    pub provider_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: Option<AppointmentStatus>,
    pub active_only: bool,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl AppointmentFilter {
    pub fn active_for_provider(provider_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            provider_id: Some(provider_id),
            subject_id: None,
            start,
            end,
            status: None,
            active_only: true,
            limit: None,
            offset: 0,
        }
    }

    pub fn active_for_subject(subject_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            provider_id: None,
            subject_id: Some(subject_id),
            ..Self::active_for_provider(Uuid::nil(), start, end)
        }
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.provider_id.map_or(true, |id| appointment.provider_id == id)
            && self.subject_id.map_or(true, |id| appointment.subject_id == id)
            && appointment.overlaps(self.start, self.end)
            && self.status.map_or(true, |status| appointment.status == status)
            && (!self.active_only || appointment.is_active())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub provider_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConflictCheckQuery {
    pub provider_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsistencyQuery {
    pub provider_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentPage {
    pub appointments: Vec<Appointment>,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictScope {
    /// Same provider, overlapping time.
    Provider,
    /// Same subject with any provider, overlapping time.
    Subject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConflict {
    pub appointment_id: Uuid,
    pub scope: ConflictScope,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_ids: Vec<Uuid>,
    pub conflicts: Vec<ScheduleConflict>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapPair {
    pub first: Uuid,
    pub second: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub provider_id: Uuid,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub active_appointments: usize,
    pub overlapping_pairs: Vec<OverlapPair>,
    pub consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionsResponse {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub version: i64,
    pub valid_transitions: Vec<AppointmentStatus>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("Cannot transition appointment from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment conflicts with {} existing booking(s)", .0.len())]
    ScheduleConflict(Vec<Uuid>),

    #[error("Appointment was modified concurrently: expected version {expected}, found {current}")]
    VersionConflict { expected: i64, current: i64 },

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Availability(#[from] AvailabilityError),
}

impl From<DeadlineExceeded> for AppointmentError {
    fn from(err: DeadlineExceeded) -> Self {
        AppointmentError::Unavailable(err.to_string())
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(id) => AppError::NotFound(format!("Appointment {} not found", id)),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            e @ AppointmentError::InvalidStatusTransition { .. } => AppError::ValidationError(e.to_string()),
            AppointmentError::ScheduleConflict(conflicting_ids) => AppError::ScheduleConflict {
                message: format!(
                    "Appointment conflicts with {} existing booking(s)",
                    conflicting_ids.len()
                ),
                conflicting_ids,
            },
            AppointmentError::VersionConflict { expected, current } => AppError::Conflict {
                message: format!(
                    "Appointment was modified concurrently: expected version {}, found {}",
                    expected, current
                ),
                current_version: Some(current),
            },
            AppointmentError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            AppointmentError::Store(StoreError::Unavailable(msg)) => AppError::ServiceUnavailable(msg),
            AppointmentError::Store(StoreError::NotFound(msg)) => AppError::NotFound(msg),
            AppointmentError::Store(StoreError::Conflict(message)) => AppError::Conflict {
                message,
                current_version: None,
            },
            AppointmentError::Store(other) => AppError::Internal(other.to_string()),
            AppointmentError::Cache(err) => AppError::ServiceUnavailable(err.to_string()),
            AppointmentError::Availability(err) => err.into(),
        }
    }
}
