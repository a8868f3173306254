//! The only place application status changes are decided.
//!
//! `PENDING -> UNDER_REVIEW`, and `PENDING | UNDER_REVIEW -> APPROVED | REJECTED`.
//! Approved and rejected applications are final.

use chrono::{DateTime, Utc};

use super::domain::{ApplicationRecord, ApplicationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move an application from {from} to {to}")]
pub struct IllegalTransition {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

impl ApplicationStatus {
    pub const fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;

        matches!(
            (self, next),
            (Pending, UnderReview)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (UnderReview, Approved)
                | (UnderReview, Rejected)
        )
    }
}

/// Move `record` to `next`, stamping `updated_at`. The record is untouched on error.
pub fn apply_transition(
    record: &mut ApplicationRecord,
    next: ApplicationStatus,
    now: DateTime<Utc>,
) -> Result<(), IllegalTransition> {
    if !record.status.can_transition_to(next) {
        return Err(IllegalTransition {
            from: record.status,
            to: next,
        });
    }

    record.status = next;
    record.updated_at = now;
    Ok(())
}
