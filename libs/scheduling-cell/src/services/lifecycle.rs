// libs/scheduling-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentStatus, SchedulingError, SchedulingRules};

pub struct AppointmentLifecycleService {
    rules: SchedulingRules,
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self {
            rules: SchedulingRules::default(),
        }
    }

    pub fn with_rules(rules: SchedulingRules) -> Self {
        Self { rules }
    }

    /// Validate that a status transition is allowed.
    ///
    /// The table is total: any (current, target) pair not listed here fails
    /// with `InvalidStatusTransition` and the stored record stays untouched.
    pub fn validate_status_transition(
        &self,
        current: &AppointmentStatus,
        target: &AppointmentStatus,
    ) -> Result<(), SchedulingError> {
        debug!("Validating status transition from {} to {}", current, target);

        let allowed = match target {
            AppointmentStatus::Confirmed => *current == AppointmentStatus::Scheduled,
            AppointmentStatus::CheckedIn => matches!(
                current,
                AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
            ),
            AppointmentStatus::InProgress => *current == AppointmentStatus::CheckedIn,
            AppointmentStatus::Completed => !matches!(
                current,
                AppointmentStatus::Cancelled | AppointmentStatus::Completed
            ),
            AppointmentStatus::NoShow => !current.is_terminal(),
            AppointmentStatus::Cancelled => {
                *current != AppointmentStatus::Completed || self.rules.allow_cancel_completed
            }
            // Scheduled is the creation state, never a transition target
            AppointmentStatus::Scheduled => false,
        };

        if !allowed {
            warn!("Invalid status transition attempted: {} -> {}", current, target);
            return Err(SchedulingError::InvalidStatusTransition(*current));
        }

        Ok(())
    }

    /// Whether rescheduling is permitted from the given status.
    pub fn can_reschedule(&self, current: &AppointmentStatus) -> bool {
        !matches!(
            current,
            AppointmentStatus::Cancelled | AppointmentStatus::Completed
        )
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
