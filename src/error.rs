use super::case::{ActionKind, MAX_COUNTERS, NegotiationKind, Role, Status};

/// Rejections and failures surfaced by the workflow. Guard rejections
/// leave the case unchanged; `Busy` is the bounded-retry surface of
/// `Conflict`.
#[derive(thiserror::Error, Debug)]
pub enum WorkflowError {
    #[error("action {action:?} is not legal from status {from:?}")]
    InvalidTransition { from: Status, action: ActionKind },
    #[error("it is not {got:?}'s turn; awaiting a response from {expected:?}")]
    NotYourTurn { expected: Option<Role>, got: Role },
    #[error(
        "you have reached the maximum of {MAX_COUNTERS} counter-offers; accept, reject or cancel instead"
    )]
    CounterLimitExceeded,
    #[error("counter proposal does not match the {kind:?} negotiation track")]
    ProposalMismatch { kind: NegotiationKind },
    #[error("a reason is required to {action:?} a case")]
    MissingReason { action: ActionKind },
    #[error("the case was modified concurrently; stored version no longer matches")]
    Conflict,
    #[error("the case is busy; concurrent updates kept winning, retry later")]
    Busy,
    #[error("no case found for id {0}")]
    NotFound(String),
    #[error("booking store failure")]
    Storage(#[from] sled::Error),
    #[error("failed to encode or decode a case record: {0}")]
    Codec(String),
}

/// Validation failures while building a case from a draft.
#[derive(thiserror::Error, Debug)]
pub enum DraftError {
    #[error("draft is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("opening price must be greater than zero for a price negotiation")]
    ZeroOpeningPrice,
}
