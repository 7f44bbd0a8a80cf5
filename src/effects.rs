//! Side-effect requests emitted by transitions. The machine never
//! performs I/O; the orchestrator dispatches these to the notification
//! and activity-log collaborators after the new state is persisted.
use super::case::{ActionKind, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the notification service to tell the named parties what
    /// just happened on the case.
    NotifyParties {
        case_id: String,
        action: ActionKind,
        recipients: Vec<Role>,
    },
    /// Ask the activity log to record the transition for audit.
    LogActivity {
        case_id: String,
        actor: Role,
        message: String,
    },
}

impl Effect {
    pub fn case_id(&self) -> &str {
        match self {
            Effect::NotifyParties { case_id, .. } | Effect::LogActivity { case_id, .. } => case_id,
        }
    }
}
