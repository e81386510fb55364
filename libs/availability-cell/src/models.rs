use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cache_cell::{CacheError, InvalidationScope};
use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::DateRange;
use shared_utils::DeadlineExceeded;

// ==============================================================================
// AVAILABILITY WINDOWS
// ==============================================================================

/// Which calendar dates a window applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowSchedule {
    /// A single calendar date.
    Date { date: NaiveDate },
    /// Every occurrence of a weekday.
    Weekly { weekday: Weekday },
}

impl WindowSchedule {
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        match self {
            WindowSchedule::Date { date: own } => *own == date,
            WindowSchedule::Weekly { weekday } => date.weekday() == *weekday,
        }
    }

    pub fn applies_within(&self, range: &DateRange) -> bool {
        match self {
            WindowSchedule::Date { date } => range.contains(*date),
            WindowSchedule::Weekly { .. } => range.days().take(7).any(|day| self.applies_on(day)),
        }
    }

    /// True when some calendar date exists to which both schedules apply.
    pub fn shares_date_with(&self, other: &WindowSchedule) -> bool {
        match (self, other) {
            (WindowSchedule::Date { date }, _) => other.applies_on(*date),
            (_, WindowSchedule::Date { date }) => self.applies_on(*date),
            (WindowSchedule::Weekly { weekday: a }, WindowSchedule::Weekly { weekday: b }) => a == b,
        }
    }

    /// Cache entries a change to a window with this schedule can affect.
    pub fn invalidation_scope(&self) -> InvalidationScope {
        match self {
            WindowSchedule::Date { date } => InvalidationScope::Dates(DateRange::single(*date)),
            WindowSchedule::Weekly { .. } => InvalidationScope::AllDates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInterval {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl BreakInterval {
    pub fn overlaps(&self, other: &BreakInterval) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }
}

/// A provider's bookable time on the dates its schedule applies to.
/// Values are immutable; an update stores a replacement with `revision + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub applies_to: WindowSchedule,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    #[serde(default)]
    pub breaks: Vec<BreakInterval>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AvailabilityWindow {
    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_duration_minutes))
    }

    /// Whether both windows can be open at the same instant on some date.
    pub fn conflicts_with(&self, other: &AvailabilityWindow) -> bool {
        self.id != other.id
            && self.provider_id == other.provider_id
            && self.applies_to.shares_date_with(&other.applies_to)
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRequest {
    pub applies_to: WindowSchedule,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_duration_minutes: u32,
    #[serde(default)]
    pub breaks: Vec<BreakInterval>,
}

impl WindowRequest {
    pub fn validate(&self) -> Result<(), AvailabilityError> {
        if self.start_time >= self.end_time {
            return Err(AvailabilityError::Validation(
                "Window start time must be before end time".to_string(),
            ));
        }

        if self.slot_duration_minutes == 0 {
            return Err(AvailabilityError::Validation(
                "Slot duration must be greater than 0 minutes".to_string(),
            ));
        }

        for brk in &self.breaks {
            if brk.start_time >= brk.end_time {
                return Err(AvailabilityError::Validation(format!(
                    "Break {}-{} must start before it ends",
                    brk.start_time, brk.end_time
                )));
            }
            if brk.start_time < self.start_time || brk.end_time > self.end_time {
                return Err(AvailabilityError::Validation(format!(
                    "Break {}-{} lies outside the window {}-{}",
                    brk.start_time, brk.end_time, self.start_time, self.end_time
                )));
            }
        }

        let mut sorted = self.breaks.clone();
        sorted.sort_by_key(|brk| (brk.start_time, brk.end_time));
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0].overlaps(&pair[1])) {
            return Err(AvailabilityError::Validation(format!(
                "Breaks {}-{} and {}-{} overlap",
                pair[0].start_time, pair[0].end_time, pair[1].start_time, pair[1].end_time
            )));
        }

        Ok(())
    }

    /// Breaks in ascending start order.
    pub fn sorted_breaks(&self) -> Vec<BreakInterval> {
        let mut breaks = self.breaks.clone();
        breaks.sort_by_key(|brk| (brk.start_time, brk.end_time));
        breaks
    }
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// Time already taken by an active appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self { start_time, end_time }
    }

    pub fn intersects(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("{0}")]
    Validation(String),

    #[error("Availability window not found: {0}")]
    NotFound(Uuid),

    #[error("Availability window was modified concurrently: {0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<DeadlineExceeded> for AvailabilityError {
    fn from(err: DeadlineExceeded) -> Self {
        AvailabilityError::Unavailable(err.to_string())
    }
}

impl From<AvailabilityError> for AppError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
            AvailabilityError::NotFound(id) => AppError::NotFound(format!("Availability window {} not found", id)),
            AvailabilityError::Conflict(message) => AppError::Conflict {
                message,
                current_version: None,
            },
            AvailabilityError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            AvailabilityError::Store(StoreError::Unavailable(msg)) => AppError::ServiceUnavailable(msg),
            AvailabilityError::Store(StoreError::NotFound(msg)) => AppError::NotFound(msg),
            AvailabilityError::Store(StoreError::Conflict(message)) => AppError::Conflict {
                message,
                current_version: None,
            },
            AvailabilityError::Store(other) => AppError::Internal(other.to_string()),
            AvailabilityError::Cache(err) => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn request(start: NaiveTime, end: NaiveTime, breaks: Vec<(NaiveTime, NaiveTime)>) -> WindowRequest {
        WindowRequest {
            applies_to: WindowSchedule::Weekly { weekday: Weekday::Mon },
            start_time: start,
            end_time: end,
            slot_duration_minutes: 30,
            breaks: breaks
                .into_iter()
                .map(|(start_time, end_time)| BreakInterval { start_time, end_time })
                .collect(),
        }
    }

    #[test]
    fn rejects_malformed_windows() {
        assert!(request(hm(12, 0), hm(9, 0), vec![]).validate().is_err());
        assert!(request(hm(9, 0), hm(12, 0), vec![(hm(8, 30), hm(9, 15))]).validate().is_err());
        assert!(request(hm(9, 0), hm(12, 0), vec![(hm(10, 0), hm(10, 30)), (hm(10, 15), hm(10, 45))])
            .validate()
            .is_err());

        let mut zero = request(hm(9, 0), hm(12, 0), vec![]);
        zero.slot_duration_minutes = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn accepts_adjacent_breaks() {
        let req = request(hm(9, 0), hm(12, 0), vec![(hm(10, 15), hm(10, 30)), (hm(10, 0), hm(10, 15))]);
        assert!(req.validate().is_ok());
        assert_eq!(req.sorted_breaks()[0].start_time, hm(10, 0));
    }

    #[test]
    fn schedules_share_dates_across_kinds() {
        let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let dated = WindowSchedule::Date { date: monday };
        let weekly_mon = WindowSchedule::Weekly { weekday: Weekday::Mon };
        let weekly_tue = WindowSchedule::Weekly { weekday: Weekday::Tue };

        assert!(dated.shares_date_with(&weekly_mon));
        assert!(weekly_mon.shares_date_with(&dated));
        assert!(!dated.shares_date_with(&weekly_tue));
        assert!(!weekly_mon.shares_date_with(&weekly_tue));
    }

    #[test]
    fn schedule_deserializes_from_tagged_json() {
        let weekly: WindowSchedule = serde_json::from_str(r#"{"kind":"weekly","weekday":"Mon"}"#).unwrap();
        assert_eq!(weekly, WindowSchedule::Weekly { weekday: Weekday::Mon });

        let dated: WindowSchedule = serde_json::from_str(r#"{"kind":"date","date":"2025-03-03"}"#).unwrap();
        assert_eq!(dated.invalidation_scope(), InvalidationScope::Dates(DateRange::single(
            NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
        )));
    }
}
