// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::ActorRole;

use crate::error::AppointmentError;
use crate::models::AppointmentStatus;

/// Role-aware status state machine.
///
/// Legality is the intersection of two pure lookup tables: the structural
/// transition graph and the per-role target policy. No role, administrative
/// included, may apply an edge absent from the graph.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Structural transition graph: the targets reachable from a status,
    /// regardless of who is asking.
    pub fn structural_targets(status: AppointmentStatus) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match status {
            AwaitingAcceptance => &[Rejected, PaymentPending, Cancelled],
            PaymentPending => &[Confirmed, Cancelled],
            Confirmed => &[Completed, Cancelled],
            // Terminal states accept no outgoing transition.
            Rejected | Completed | Cancelled => &[],
        }
    }

    /// Per-role target policy, applied on top of the structural graph.
    pub fn role_targets(role: ActorRole) -> &'static [AppointmentStatus] {
        use AppointmentStatus::*;
        match role {
            ActorRole::Patient => &[Cancelled],
            ActorRole::Doctor => &[Rejected, PaymentPending, Completed, Cancelled],
            ActorRole::Admin => &AppointmentStatus::ALL,
        }
    }

    pub fn can_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
        role: ActorRole,
    ) -> bool {
        Self::structural_targets(current).contains(&next)
            && Self::role_targets(role).contains(&next)
    }

    pub fn validate_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
        role: ActorRole,
    ) -> Result<(), AppointmentError> {
        if !self.can_transition(current, next, role) {
            warn!(
                "Invalid status transition attempted by {}: {} -> {}",
                role, current, next
            );
            return Err(AppointmentError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        debug!("Status transition validated: {} -> {}", current, next);
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
