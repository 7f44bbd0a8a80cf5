//! Orchestrator for the inspection workflow: the load-transition-save
//! loop plus effect dispatch.
//!
//! Collaborators (payments, notifications, activity log) are
//! constructor-injected trait objects; nothing here is global. Effect
//! dispatch is fire-and-forget: once a transition is persisted it is
//! durable, and a flaky notification provider can neither block nor
//! roll it back.
use super::case::{CaseDraft, InspectionCase, Role, Stage, Status, TimeStamp};
use super::effects::Effect;
use super::error::WorkflowError;
use super::machine::{self, Action, Transition, TransitionCtx};
use super::store::BookingStore;
use chrono::Utc;
use std::sync::Arc;

/// Conflict retries before a caller is told the case is busy.
pub const SAVE_RETRIES: usize = 3;

/// Payments side. Drives `ConfirmTransaction`; the machine itself
/// never talks to it.
pub trait TransactionService: Send + Sync {
    fn is_settled(&self, transaction_ref: &str) -> bool;
}

/// Outbound notifications. Best effort; errors are logged, never
/// propagated.
pub trait NotificationService: Send + Sync {
    fn send(&self, effect: &Effect) -> anyhow::Result<()>;
}

/// Audit trail collaborator. Same best-effort contract as
/// notifications.
pub trait ActivityLog: Send + Sync {
    fn record(&self, effect: &Effect) -> anyhow::Result<()>;
}

/// Read model handed back to callers after every accepted operation.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseView {
    pub case_id: String,
    pub status: Status,
    pub stage: Stage,
    pub pending_response_from: Option<Role>,
    pub counter_count: u8,
    pub negotiation_price: Option<u64>,
    pub letter_of_intention_doc_ref: Option<String>,
    pub scheduled_for: Option<TimeStamp<Utc>>,
    pub version: u64,
}

impl From<&InspectionCase> for CaseView {
    fn from(case: &InspectionCase) -> Self {
        Self {
            case_id: case.case_id.clone(),
            status: case.status,
            stage: case.stage(),
            pending_response_from: case.pending_response_from,
            counter_count: case.counter_count,
            negotiation_price: case.negotiation_price,
            letter_of_intention_doc_ref: case.letter_of_intention_doc_ref.clone(),
            scheduled_for: case.scheduled_for,
            version: case.version,
        }
    }
}

pub struct WorkflowService {
    store: BookingStore,
    transactions: Arc<dyn TransactionService>,
    notifier: Arc<dyn NotificationService>,
    activity: Arc<dyn ActivityLog>,
}

impl WorkflowService {
    pub fn new(
        store: BookingStore,
        transactions: Arc<dyn TransactionService>,
        notifier: Arc<dyn NotificationService>,
        activity: Arc<dyn ActivityLog>,
    ) -> Self {
        Self {
            store,
            transactions,
            notifier,
            activity,
        }
    }

    /// Intake: a buyer submits an inspection request tied to a
    /// settling transaction. The case starts in `PendingTransaction`.
    pub fn open_case(&self, draft: CaseDraft) -> anyhow::Result<CaseView> {
        let case = draft.build()?;
        self.store.create(&case)?;

        tracing::info!(case_id = %case.case_id, property_id = %case.property_id, "inspection case opened");

        Ok(CaseView::from(&case))
    }

    /// Read-only view of a case.
    pub fn view(&self, case_id: &str) -> Result<CaseView, WorkflowError> {
        let (case, _token) = self.store.load(case_id)?;
        Ok(CaseView::from(&case))
    }

    /// The single write operation exposed to callers. Loads the case,
    /// runs the pure transition, compare-and-swap saves, and
    /// dispatches effects. A lost save race is retried with fresh
    /// state up to [`SAVE_RETRIES`] times, so a stale action correctly
    /// fails its guards against current data instead of silently
    /// applying; after that the caller gets `Busy`.
    pub fn apply(
        &self,
        case_id: &str,
        action: Action,
        actor: Role,
    ) -> Result<CaseView, WorkflowError> {
        for attempt in 0..SAVE_RETRIES {
            let (case, token) = self.store.load(case_id)?;

            // The only fact the pure machine cannot derive itself.
            let settled = match &action {
                Action::ConfirmTransaction => self.transactions.is_settled(&case.transaction_ref),
                _ => false,
            };
            let ctx = TransitionCtx::new(settled);

            let Transition {
                case: next,
                effects,
                replayed,
            } = machine::transition(&case, &action, actor, &ctx)?;

            if replayed {
                // At-least-once redelivery: nothing to persist, no
                // effects fire a second time.
                return Ok(CaseView::from(&next));
            }

            match self.store.save(next, token) {
                Ok((saved, _token)) => {
                    tracing::debug!(
                        case_id,
                        status = ?saved.status,
                        version = saved.version,
                        "transition persisted"
                    );
                    self.dispatch(&effects);
                    return Ok(CaseView::from(&saved));
                }
                Err(WorkflowError::Conflict) => {
                    tracing::debug!(case_id, attempt, "optimistic save lost, retrying");
                    continue;
                }
                Err(other) => return Err(other),
            }
        }

        Err(WorkflowError::Busy)
    }

    // The transition is durable by the time we get here; delivery
    // failures are the collaborator's to retry.
    fn dispatch(&self, effects: &[Effect]) {
        for effect in effects {
            let result = match effect {
                Effect::NotifyParties { .. } => self.notifier.send(effect),
                Effect::LogActivity { .. } => self.activity.record(effect),
            };
            if let Err(err) = result {
                tracing::warn!(case_id = effect.case_id(), "effect dispatch failed: {err:#}");
            }
        }
    }
}
