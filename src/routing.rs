//! Pure, stateless guards consumed only by the state machine: the
//! counter-offer limiter and the "whose turn is it" router. Neither is
//! invoked directly by callers.
use super::case::{InspectionCase, MAX_COUNTERS, Role, Status};

/// Counter-Offer Limiter: the cap forces convergence, a fourth round
/// must become accept, reject or cancel.
pub fn can_counter(case: &InspectionCase) -> bool {
    case.counter_count < MAX_COUNTERS
}

/// Response-Router: who must act next, given the status just entered
/// and whoever was on the hook before. A lookup table, not a
/// heuristic; adding a status forces a decision here.
pub fn next_responder(status: Status, previous: Option<Role>) -> Option<Role> {
    match status {
        // Awaiting settlement confirmation from the payments side.
        Status::PendingTransaction => Some(Role::Admin),
        // The party put on the hook when negotiation opened stays on it.
        Status::ActiveNegotiation => previous,
        // A counter flips the table to the other side.
        Status::NegotiationCountered => previous.map(Role::counterpart),
        // An admin or field agent must now schedule the inspection.
        Status::NegotiationAccepted => Some(Role::Admin),
        Status::InspectionApproved => Some(Role::Admin),
        Status::InspectionRescheduled => Some(Role::Admin),
        Status::TransactionFailed
        | Status::NegotiationRejected
        | Status::NegotiationCancelled
        | Status::Completed
        | Status::Cancelled => None,
    }
}
