// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService {
    auto_confirm: bool,
}

impl AppointmentLifecycleService {
    pub fn new(auto_confirm: bool) -> Self {
        Self { auto_confirm }
    }

    /// Status a freshly booked appointment starts in.
    pub fn initial_status(&self) -> AppointmentStatus {
        if self.auto_confirm {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Requested
        }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Requested => vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::CheckedIn,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::CheckedIn => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const ALL: [AppointmentStatus; 6] = [
        AppointmentStatus::Requested,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
    ];

    #[test]
    fn test_forward_path_is_allowed() {
        let lifecycle = AppointmentLifecycleService::default();

        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Requested, AppointmentStatus::Confirmed)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::CheckedIn)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::CheckedIn, AppointmentStatus::Completed)
            .is_ok());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        let lifecycle = AppointmentLifecycleService::default();

        for terminal in ALL.into_iter().filter(|status| status.is_terminal()) {
            assert!(lifecycle.get_valid_transitions(terminal).is_empty());
            for next in ALL {
                assert_matches!(
                    lifecycle.validate_status_transition(terminal, next),
                    Err(AppointmentError::InvalidStatusTransition { .. })
                );
            }
        }
    }

    #[test]
    fn test_no_show_only_from_confirmed() {
        let lifecycle = AppointmentLifecycleService::default();

        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Requested, AppointmentStatus::NoShow)
            .is_err());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::CheckedIn, AppointmentStatus::NoShow)
            .is_err());
    }

    #[test]
    fn test_initial_status_follows_auto_confirm() {
        assert_eq!(AppointmentLifecycleService::new(false).initial_status(), AppointmentStatus::Requested);
        assert_eq!(AppointmentLifecycleService::new(true).initial_status(), AppointmentStatus::Confirmed);
    }
}
