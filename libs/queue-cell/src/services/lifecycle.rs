use tracing::{debug, warn};

use crate::error::QueueError;
use crate::models::QueueStatus;

/// The queue entry state machine. Every mutation in the system goes through
/// `validate_transition` before it reaches the store, and the store re-checks
/// the current status with a conditional update, so a stale caller is
/// rejected rather than silently overwriting a concurrent change.
pub struct QueueLifecycle;

impl QueueLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// All statuses reachable in one step from `current`.
    pub fn valid_transitions(&self, current: &QueueStatus) -> Vec<QueueStatus> {
        match current {
            QueueStatus::Waiting => vec![
                QueueStatus::Called,
                QueueStatus::Skipped,
                QueueStatus::Cancelled,
            ],
            QueueStatus::Called => vec![
                QueueStatus::InProgress,
                QueueStatus::NoShow,
                QueueStatus::Skipped,
                QueueStatus::Cancelled,
            ],
            QueueStatus::InProgress => vec![QueueStatus::Completed, QueueStatus::Cancelled],
            // Terminal states
            QueueStatus::Completed
            | QueueStatus::Skipped
            | QueueStatus::Cancelled
            | QueueStatus::NoShow => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: &QueueStatus,
        target: &QueueStatus,
    ) -> Result<(), QueueError> {
        debug!("Validating queue transition {} -> {}", current, target);

        if !self.valid_transitions(current).contains(target) {
            warn!("Invalid queue transition attempted: {} -> {}", current, target);
            return Err(QueueError::StateConflict {
                from: *current,
                to: *target,
            });
        }

        Ok(())
    }

    /// The timestamp column set exactly once when `target` is entered.
    pub fn timestamp_field(&self, target: &QueueStatus) -> Option<&'static str> {
        match target {
            QueueStatus::Called => Some("time_called"),
            QueueStatus::InProgress => Some("time_started"),
            QueueStatus::Completed => Some("time_completed"),
            _ => None,
        }
    }
}

impl Default for QueueLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
