//! Negotiation state machine: the pure transition function.
//!
//! `(current case, action, actor role) -> (new case, effect requests)`
//! or a rejection that leaves the case untouched. All guards live here;
//! the routing table and counter limiter are consulted as derivations.
//! No I/O happens inside a transition, so the orchestrator can safely
//! recompute one after losing an optimistic-concurrency race.
use super::case::{
    ActionKind, HistoryEntry, InspectionCase, NegotiationKind, Role, Status, TimeStamp,
};
use super::effects::Effect;
use super::error::WorkflowError;
use super::outcome::{InspectionOutcome, InspectionReport};
use super::routing::{can_counter, next_responder};
use chrono::Utc;

/// A revised offer made in response to the other party's last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proposal {
    Price(u64),
    /// Digest reference to an uploaded Letter of Intention.
    Document(String),
}

/// Workflow actions with their payloads. [`ActionKind`] is the bare
/// discriminant used in history entries and effects.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ConfirmTransaction,
    Counter(Proposal),
    Accept,
    Reject { reason: String },
    Cancel { reason: String },
    ApproveInspection { scheduled_for: TimeStamp<Utc> },
    Reschedule { scheduled_for: TimeStamp<Utc> },
    StartInspection,
    SubmitReport(InspectionReport),
    Close,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ConfirmTransaction => ActionKind::ConfirmTransaction,
            Action::Counter(_) => ActionKind::Counter,
            Action::Accept => ActionKind::Accept,
            Action::Reject { .. } => ActionKind::Reject,
            Action::Cancel { .. } => ActionKind::Cancel,
            Action::ApproveInspection { .. } => ActionKind::ApproveInspection,
            Action::Reschedule { .. } => ActionKind::Reschedule,
            Action::StartInspection => ActionKind::StartInspection,
            Action::SubmitReport(_) => ActionKind::SubmitReport,
            Action::Close => ActionKind::Close,
        }
    }
}

/// Facts the pure machine cannot fetch for itself. Built by the
/// orchestrator once per attempt; `transaction_settled` only matters
/// for `ConfirmTransaction`.
#[derive(Debug, Clone, Copy)]
pub struct TransitionCtx {
    pub now: TimeStamp<Utc>,
    pub transaction_settled: bool,
}

impl TransitionCtx {
    pub fn new(transaction_settled: bool) -> Self {
        Self {
            now: TimeStamp::new(),
            transaction_settled,
        }
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub case: InspectionCase,
    pub effects: Vec<Effect>,
    /// True when the action was an at-least-once redelivery of the
    /// last applied transition; the case is returned as-is and no
    /// effects fire a second time.
    pub replayed: bool,
}

pub fn transition(
    case: &InspectionCase,
    action: &Action,
    actor: Role,
    ctx: &TransitionCtx,
) -> Result<Transition, WorkflowError> {
    let kind = action.kind();

    // Replay of the last applied (actor, action) pair against the state
    // it produced is a no-op, not an error. History only records the
    // action discriminant, so an action with a payload additionally has
    // to carry the payload already on the record; a differing payload
    // is a new intent and must face the guards.
    if let Some(last) = case.last_transition()
        && last.actor == actor
        && last.action == kind
        && last.resulting_status == case.status
        && match action {
            Action::Counter(Proposal::Price(amount)) => {
                case.negotiation_price == Some(*amount)
            }
            Action::Counter(Proposal::Document(doc_ref)) => {
                case.letter_of_intention_doc_ref.as_deref() == Some(doc_ref)
            }
            Action::ApproveInspection { scheduled_for }
            | Action::Reschedule { scheduled_for } => {
                case.scheduled_for == Some(*scheduled_for)
            }
            Action::Reject { reason } | Action::Cancel { reason } => {
                case.reason_for_rejection_or_cancellation.as_deref() == Some(reason.as_str())
            }
            Action::SubmitReport(report) => {
                case.inspection_outcome.as_ref().is_some_and(|outcome| {
                    outcome.buyer_present == report.buyer_present
                        && outcome.seller_present == report.seller_present
                        && outcome.buyer_interest_level == Some(report.buyer_interest_level)
                        && outcome.notes.as_deref() == Some(report.notes.as_str())
                })
            }
            Action::ConfirmTransaction
            | Action::Accept
            | Action::StartInspection
            | Action::Close => true,
        }
    {
        return Ok(Transition {
            case: case.clone(),
            effects: vec![],
            replayed: true,
        });
    }

    // Terminal states accept no further actions except read.
    if case.status.is_terminal() {
        return Err(WorkflowError::InvalidTransition {
            from: case.status,
            action: kind,
        });
    }

    let mut next = case.clone();
    let mut effects: Vec<Effect> = vec![];

    match action {
        Action::ConfirmTransaction => {
            require_status(case, &[Status::PendingTransaction], kind)?;
            require_turn(case, actor)?;

            if ctx.transaction_settled {
                next.status = Status::ActiveNegotiation;
                // Negotiation opens against the non-initiating party;
                // the initiator is always buyer-side.
                let responder = Role::Buyer.counterpart();
                next.pending_response_from =
                    next_responder(next.status, Some(responder));
                effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller]));
                effects.push(log(case, actor, "transaction settled, negotiation opened"));
            } else {
                next.status = Status::TransactionFailed;
                next.pending_response_from = next_responder(next.status, None);
                next.reason_for_rejection_or_cancellation =
                    Some("transaction settlement failed".to_string());
                effects.push(notify(case, kind, vec![Role::Buyer]));
                effects.push(log(case, actor, "transaction settlement failed"));
            }
        }
        Action::Counter(proposal) => {
            require_status(
                case,
                &[Status::ActiveNegotiation, Status::NegotiationCountered],
                kind,
            )?;
            // The cap outranks the turn guard: once the budget is
            // spent, a fourth counter bounces identically for both
            // parties.
            if !can_counter(case) {
                return Err(WorkflowError::CounterLimitExceeded);
            }
            require_turn(case, actor)?;

            match (case.negotiation_kind, proposal) {
                (NegotiationKind::Price, Proposal::Price(amount)) => {
                    next.negotiation_price = Some(*amount);
                }
                (NegotiationKind::LetterOfIntention, Proposal::Document(doc_ref)) => {
                    next.letter_of_intention_doc_ref = Some(doc_ref.clone());
                    next.approve_letter_of_intention = Some(false);
                }
                _ => {
                    return Err(WorkflowError::ProposalMismatch {
                        kind: case.negotiation_kind,
                    });
                }
            }

            next.counter_count += 1;
            next.status = Status::NegotiationCountered;
            next.pending_response_from = next_responder(next.status, Some(actor));
            effects.push(notify(case, kind, vec![actor.counterpart()]));
            effects.push(log(case, actor, "counter-offer submitted"));
        }
        Action::Accept => {
            require_status(
                case,
                &[Status::ActiveNegotiation, Status::NegotiationCountered],
                kind,
            )?;
            require_turn(case, actor)?;

            next.status = Status::NegotiationAccepted;
            next.pending_response_from = next_responder(next.status, Some(actor));
            if case.negotiation_kind == NegotiationKind::LetterOfIntention {
                next.approve_letter_of_intention = Some(true);
            }
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller, Role::Admin]));
            effects.push(log(case, actor, "offer accepted, awaiting inspection scheduling"));
        }
        Action::Reject { reason } => {
            require_status(
                case,
                &[
                    Status::PendingTransaction,
                    Status::ActiveNegotiation,
                    Status::NegotiationCountered,
                    Status::NegotiationAccepted,
                ],
                kind,
            )?;
            require_reason(reason, kind)?;

            next.status = Status::NegotiationRejected;
            next.pending_response_from = next_responder(next.status, None);
            next.reason_for_rejection_or_cancellation = Some(reason.clone());
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller]));
            effects.push(log(case, actor, "negotiation rejected"));
        }
        Action::Cancel { reason } => {
            require_reason(reason, kind)?;

            next.status = match case.status {
                Status::PendingTransaction
                | Status::ActiveNegotiation
                | Status::NegotiationCountered
                | Status::NegotiationAccepted => Status::NegotiationCancelled,
                Status::InspectionApproved | Status::InspectionRescheduled => {
                    if let Some(outcome) = next.inspection_outcome.as_mut() {
                        outcome.cancel();
                    }
                    Status::Cancelled
                }
                _ => {
                    return Err(WorkflowError::InvalidTransition {
                        from: case.status,
                        action: kind,
                    });
                }
            };
            next.pending_response_from = next_responder(next.status, None);
            next.reason_for_rejection_or_cancellation = Some(reason.clone());
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller]));
            effects.push(log(case, actor, "case cancelled"));
        }
        Action::ApproveInspection { scheduled_for } => {
            require_status(case, &[Status::NegotiationAccepted], kind)?;
            require_turn(case, actor)?;

            next.status = Status::InspectionApproved;
            next.scheduled_for = Some(*scheduled_for);
            next.inspection_outcome = Some(InspectionOutcome::new());
            next.pending_response_from = next_responder(next.status, Some(actor));
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller]));
            effects.push(log(case, actor, "inspection date confirmed"));
        }
        Action::Reschedule { scheduled_for } => {
            require_status(case, &[Status::InspectionApproved], kind)?;
            require_turn(case, actor)?;

            next.status = Status::InspectionRescheduled;
            next.scheduled_for = Some(*scheduled_for);
            next.pending_response_from = next_responder(next.status, Some(actor));
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller]));
            effects.push(log(case, actor, "inspection rescheduled"));
        }
        Action::StartInspection => {
            require_status(
                case,
                &[Status::InspectionApproved, Status::InspectionRescheduled],
                kind,
            )?;
            require_turn(case, actor)?;

            let outcome = outcome_mut(&mut next, case.status, kind)?;
            if !outcome.can_start() {
                return Err(WorkflowError::InvalidTransition {
                    from: case.status,
                    action: kind,
                });
            }
            outcome.start(ctx.now);
            effects.push(log(case, actor, "inspection visit started"));
        }
        Action::SubmitReport(report) => {
            require_status(
                case,
                &[Status::InspectionApproved, Status::InspectionRescheduled],
                kind,
            )?;
            require_turn(case, actor)?;

            let outcome = outcome_mut(&mut next, case.status, kind)?;
            if !outcome.can_submit_report() {
                return Err(WorkflowError::InvalidTransition {
                    from: case.status,
                    action: kind,
                });
            }
            outcome.submit_report(report.clone(), ctx.now);
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller]));
            effects.push(log(case, actor, "inspection report filed"));
        }
        Action::Close => {
            require_status(
                case,
                &[Status::InspectionApproved, Status::InspectionRescheduled],
                kind,
            )?;
            require_turn(case, actor)?;

            let successful = match case.inspection_outcome.as_ref() {
                Some(outcome) if outcome.report_status.is_terminal() => outcome.folded_success(),
                _ => {
                    return Err(WorkflowError::InvalidTransition {
                        from: case.status,
                        action: kind,
                    });
                }
            };

            next.status = if successful {
                Status::Completed
            } else {
                Status::Cancelled
            };
            next.pending_response_from = next_responder(next.status, None);
            effects.push(notify(case, kind, vec![Role::Buyer, Role::Seller, Role::Admin]));
            effects.push(log(case, actor, "inspection closed out"));
        }
    }

    next.record(HistoryEntry {
        actor,
        action: kind,
        at: ctx.now,
        resulting_status: next.status,
    });

    Ok(Transition {
        case: next,
        effects,
        replayed: false,
    })
}

fn require_status(
    case: &InspectionCase,
    allowed: &[Status],
    action: ActionKind,
) -> Result<(), WorkflowError> {
    if allowed.contains(&case.status) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            from: case.status,
            action,
        })
    }
}

fn require_turn(case: &InspectionCase, actor: Role) -> Result<(), WorkflowError> {
    if case.pending_response_from == Some(actor) {
        Ok(())
    } else {
        Err(WorkflowError::NotYourTurn {
            expected: case.pending_response_from,
            got: actor,
        })
    }
}

fn require_reason(reason: &str, action: ActionKind) -> Result<(), WorkflowError> {
    if reason.trim().is_empty() {
        Err(WorkflowError::MissingReason { action })
    } else {
        Ok(())
    }
}

fn outcome_mut<'a>(
    next: &'a mut InspectionCase,
    from: Status,
    action: ActionKind,
) -> Result<&'a mut InspectionOutcome, WorkflowError> {
    next.inspection_outcome
        .as_mut()
        .ok_or(WorkflowError::InvalidTransition { from, action })
}

fn notify(case: &InspectionCase, action: ActionKind, recipients: Vec<Role>) -> Effect {
    Effect::NotifyParties {
        case_id: case.case_id.clone(),
        action,
        recipients,
    }
}

fn log(case: &InspectionCase, actor: Role, message: &str) -> Effect {
    Effect::LogActivity {
        case_id: case.case_id.clone(),
        actor,
        message: message.to_string(),
    }
}
