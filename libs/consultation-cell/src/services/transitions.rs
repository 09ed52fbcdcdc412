// libs/consultation-cell/src/services/transitions.rs
use tracing::{debug, warn};

use shared_models::auth::ActorRole;

use crate::error::ConsultationError;
use crate::models::{ConsultationRecord, ConsultationStatus};

/// Single source of truth for legal status changes.
///
/// `completed` and `cancelled` are terminal. `admin` holds no transition rights here.
pub fn allowed_transitions(current: ConsultationStatus, role: ActorRole) -> &'static [ConsultationStatus] {
    use ConsultationStatus::*;

    match (current, role) {
        (_, ActorRole::Admin) => &[],
        (Pending, ActorRole::Doctor) => &[Scheduled, Cancelled],
        (Pending, ActorRole::Patient) => &[Cancelled],
        (Scheduled, ActorRole::Doctor | ActorRole::Patient) => &[InProgress, Cancelled],
        (InProgress, ActorRole::Doctor | ActorRole::Patient) => &[Completed],
        (Completed | Cancelled, _) => &[],
    }
}

pub fn can_transition(current: ConsultationStatus, requested: ConsultationStatus, role: ActorRole) -> bool {
    allowed_transitions(current, role).contains(&requested)
}

pub struct ConsultationLifecycleService;

impl ConsultationLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate a requested status change for one record.
    ///
    /// `assigning_doctor` is the doctor who would own the record after the change
    /// (the accepting doctor on `pending -> scheduled`).
    pub fn validate_transition(
        &self,
        record: &ConsultationRecord,
        requested: ConsultationStatus,
        role: ActorRole,
        assigning_doctor: Option<&str>,
    ) -> Result<(), ConsultationError> {
        debug!(
            consultation_id = %record.id,
            "Validating status transition from {} to {} for {}",
            record.status, requested, role
        );

        let invalid = || ConsultationError::InvalidTransition {
            current: record.status,
            requested,
            role,
        };

        if !can_transition(record.status, requested, role) {
            warn!(
                consultation_id = %record.id,
                "Invalid status transition attempted: {} -> {} by {}",
                record.status, requested, role
            );
            return Err(invalid());
        }

        let doctor_after = record.has_doctor() || assigning_doctor.is_some_and(|id| !id.is_empty());
        if matches!(requested, ConsultationStatus::InProgress | ConsultationStatus::Completed) && !doctor_after {
            warn!(
                consultation_id = %record.id,
                "Consultation without a doctor cannot move to {}",
                requested
            );
            return Err(invalid());
        }

        Ok(())
    }
}

impl Default for ConsultationLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
