use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Appointment, ConflictScope, OverlapPair, ScheduleConflict};

/// A proposed booking, or a time range being previewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingCandidate {
    /// Set when the candidate is an existing appointment, so it never conflicts with itself.
    pub id: Option<Uuid>,
    pub provider_id: Uuid,
    pub subject_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<&Appointment> for BookingCandidate {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: Some(appointment.id),
            provider_id: appointment.provider_id,
            subject_id: Some(appointment.subject_id),
            start_time: appointment.start_time,
            end_time: appointment.end_time,
        }
    }
}

/// Pure interval-overlap logic. Holds no state and performs no I/O.
pub struct ConflictDetector;

impl ConflictDetector {
    pub fn intervals_overlap(
        a_start: DateTime<Utc>,
        a_end: DateTime<Utc>,
        b_start: DateTime<Utc>,
        b_end: DateTime<Utc>,
    ) -> bool {
        a_start < b_end && b_start < a_end
    }

    /// Every active appointment the candidate collides with, ordered by start then id.
    /// A collision on the provider is reported as such even when the subject
    /// also matches.
    pub fn detect(candidate: &BookingCandidate, existing: &[Appointment]) -> Vec<ScheduleConflict> {
        let mut conflicts: Vec<ScheduleConflict> = existing
            .iter()
            .filter(|other| other.is_active())
            .filter(|other| candidate.id != Some(other.id))
            .filter(|other| {
                Self::intervals_overlap(candidate.start_time, candidate.end_time, other.start_time, other.end_time)
            })
            .filter_map(|other| {
                let scope = if other.provider_id == candidate.provider_id {
                    ConflictScope::Provider
                } else if candidate.subject_id == Some(other.subject_id) {
                    ConflictScope::Subject
                } else {
                    return None;
                };
                Some(ScheduleConflict {
                    appointment_id: other.id,
                    scope,
                    start_time: other.start_time,
                    end_time: other.end_time,
                })
            })
            .collect();

        conflicts.sort_by_key(|conflict| (conflict.start_time, conflict.appointment_id));
        conflicts.dedup_by_key(|conflict| conflict.appointment_id);
        conflicts
    }

    pub fn find_conflicts(candidate: &BookingCandidate, existing: &[Appointment]) -> Vec<Uuid> {
        Self::detect(candidate, existing)
            .into_iter()
            .map(|conflict| conflict.appointment_id)
            .collect()
    }

    /// Pairs of active appointments on the same provider whose intervals overlap.
    pub fn find_overlapping_pairs(appointments: &[Appointment]) -> Vec<OverlapPair> {
        let mut active: Vec<&Appointment> = appointments.iter().filter(|a| a.is_active()).collect();
        active.sort_by_key(|a| (a.provider_id, a.start_time, a.id));

        let mut pairs = Vec::new();
        for (i, first) in active.iter().enumerate() {
            for second in &active[i + 1..] {
                if second.provider_id != first.provider_id || second.start_time >= first.end_time {
                    break;
                }
                pairs.push(OverlapPair {
                    first: first.id,
                    second: second.id,
                });
            }
        }
        pairs
    }
}
