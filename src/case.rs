//! Core inspection-case record and negotiation vocabulary types
use super::error::DraftError;
use super::outcome::InspectionOutcome;
use super::routing;
use super::utils;
use chrono::{DateTime, TimeZone, Utc};

/// Price counter-rounds allowed per case before the parties must
/// accept, reject or cancel.
pub const MAX_COUNTERS: u8 = 3;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[n(0)]
    Buyer,
    #[n(1)]
    Seller,
    #[n(2)]
    Admin,
}

impl Role {
    /// The party on the other side of the negotiation table.
    /// Admin has no counterpart; it mediates.
    pub fn counterpart(self) -> Role {
        match self {
            Role::Buyer => Role::Seller,
            Role::Seller => Role::Buyer,
            Role::Admin => Role::Admin,
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationKind {
    #[n(0)]
    Price,
    #[n(1)]
    LetterOfIntention,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionMode {
    #[n(0)]
    InPerson,
    #[n(1)]
    Virtual,
}

/// Fine-grained workflow state. The transition function in
/// [`crate::machine`] is the only writer.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[n(0)]
    PendingTransaction,
    #[n(1)]
    TransactionFailed,
    #[n(2)]
    ActiveNegotiation,
    #[n(3)]
    NegotiationCountered,
    #[n(4)]
    NegotiationAccepted,
    #[n(5)]
    NegotiationRejected,
    #[n(6)]
    NegotiationCancelled,
    #[n(7)]
    InspectionApproved,
    #[n(8)]
    InspectionRescheduled,
    #[n(9)]
    Completed,
    #[n(10)]
    Cancelled,
}

/// Coarse funnel phase. Never stored; always derived from [`Status`]
/// so the two axes cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Negotiation,
    Inspection,
    Completed,
    Cancelled,
}

impl Status {
    pub fn stage(self) -> Stage {
        match self {
            Status::PendingTransaction
            | Status::ActiveNegotiation
            | Status::NegotiationCountered
            | Status::NegotiationAccepted => Stage::Negotiation,
            Status::TransactionFailed
            | Status::NegotiationRejected
            | Status::NegotiationCancelled
            | Status::Cancelled => Stage::Cancelled,
            Status::InspectionApproved | Status::InspectionRescheduled => Stage::Inspection,
            Status::Completed => Stage::Completed,
        }
    }
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::TransactionFailed
                | Status::NegotiationRejected
                | Status::NegotiationCancelled
                | Status::Completed
                | Status::Cancelled
        )
    }
}

/// Discriminant of a workflow action, recorded in history entries and
/// effect requests. Payloads live on [`crate::machine::Action`].
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    #[n(0)]
    ConfirmTransaction,
    #[n(1)]
    Counter,
    #[n(2)]
    Accept,
    #[n(3)]
    Reject,
    #[n(4)]
    Cancel,
    #[n(5)]
    ApproveInspection,
    #[n(6)]
    Reschedule,
    #[n(7)]
    StartInspection,
    #[n(8)]
    SubmitReport,
    #[n(9)]
    Close,
}

/// One past transition. The last entry doubles as the idempotency
/// check for replayed actions.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    #[n(0)]
    pub actor: Role,
    #[n(1)]
    pub action: ActionKind,
    #[n(2)]
    pub at: TimeStamp<Utc>,
    #[n(3)]
    pub resulting_status: Status,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

// Only the Utc instantiation is Copy; a generic bound would demand
// `T::Offset: Copy`, which `derive` cannot express.
impl Copy for TimeStamp<Utc> {}

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

/// The central entity: one buyer-property inspection/negotiation
/// attempt. Created from a [`CaseDraft`], mutated exclusively through
/// the state machine, never physically deleted.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct InspectionCase {
    #[n(0)]
    pub case_id: String,
    #[n(1)]
    pub property_id: String,
    #[n(2)]
    pub owner_id: String,
    #[n(3)]
    pub buyer_id: String,
    #[n(4)]
    pub requested_by: String, // buyer-side actor who initiated
    #[n(5)]
    pub assigned_field_agent: Option<String>,
    #[n(6)]
    pub transaction_ref: String,
    #[n(7)]
    pub negotiation_kind: NegotiationKind,
    #[n(8)]
    pub mode: InspectionMode,
    #[n(9)]
    pub status: Status,
    #[n(10)]
    pub negotiation_price: Option<u64>,
    #[n(11)]
    pub letter_of_intention_doc_ref: Option<String>,
    #[n(12)]
    pub counter_count: u8,
    #[n(13)]
    pub pending_response_from: Option<Role>,
    #[n(14)]
    pub approve_letter_of_intention: Option<bool>,
    #[n(15)]
    pub scheduled_for: Option<TimeStamp<Utc>>,
    #[n(16)]
    pub inspection_outcome: Option<InspectionOutcome>,
    #[n(17)]
    pub reason_for_rejection_or_cancellation: Option<String>,
    #[n(18)]
    pub history: Vec<HistoryEntry>,
    #[n(19)]
    pub version: u64,
}

impl InspectionCase {
    pub fn stage(&self) -> Stage {
        self.status.stage()
    }
    pub fn last_transition(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }
}

// Also used for constructing intake requests before a case exists.
#[derive(Debug, Default)]
pub struct CaseDraft {
    property_id: Option<String>,
    owner_id: Option<String>,
    buyer_id: Option<String>,
    requested_by: Option<String>,
    assigned_field_agent: Option<String>,
    transaction_ref: Option<String>,
    negotiation_kind: Option<NegotiationKind>,
    mode: Option<InspectionMode>,
    opening_price: Option<u64>,
    letter_of_intention_doc_ref: Option<String>,
}

impl CaseDraft {
    /// Construct a new draft, the basis for an inspection request
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_property(mut self, property_id: &str) -> Self {
        self.property_id = Some(property_id.to_owned());
        self
    }
    pub fn set_owner(mut self, owner_id: &str) -> Self {
        self.owner_id = Some(owner_id.to_owned());
        self
    }
    pub fn set_buyer(mut self, buyer_id: &str) -> Self {
        self.buyer_id = Some(buyer_id.to_owned());
        self
    }
    pub fn set_requested_by(mut self, actor_id: &str) -> Self {
        self.requested_by = Some(actor_id.to_owned());
        self
    }
    pub fn set_field_agent(mut self, agent_id: &str) -> Self {
        self.assigned_field_agent = Some(agent_id.to_owned());
        self
    }
    pub fn set_transaction_ref(mut self, transaction_ref: &str) -> Self {
        self.transaction_ref = Some(transaction_ref.to_owned());
        self
    }
    pub fn set_negotiation_kind(mut self, kind: NegotiationKind) -> Self {
        self.negotiation_kind = Some(kind);
        self
    }
    pub fn set_mode(mut self, mode: InspectionMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn set_opening_price(mut self, amount: u64) -> Self {
        self.opening_price = Some(amount);
        self
    }
    pub fn set_letter_of_intention(mut self, doc_ref: &str) -> Self {
        self.letter_of_intention_doc_ref = Some(doc_ref.to_owned());
        self
    }

    /// Checks fields, performs validation and mints the case record in
    /// `PendingTransaction` with a fresh bech32 case id.
    pub fn build(self) -> anyhow::Result<InspectionCase> {
        let property_id = self
            .property_id
            .ok_or(DraftError::MissingField("property_id"))?;
        let owner_id = self.owner_id.ok_or(DraftError::MissingField("owner_id"))?;
        let buyer_id = self.buyer_id.ok_or(DraftError::MissingField("buyer_id"))?;
        let requested_by = self
            .requested_by
            .ok_or(DraftError::MissingField("requested_by"))?;
        let transaction_ref = self
            .transaction_ref
            .ok_or(DraftError::MissingField("transaction_ref"))?;
        let negotiation_kind = self
            .negotiation_kind
            .ok_or(DraftError::MissingField("negotiation_kind"))?;
        let mode = self.mode.ok_or(DraftError::MissingField("mode"))?;

        match negotiation_kind {
            NegotiationKind::Price => {
                if self.opening_price.unwrap_or(0) == 0 {
                    return Err(DraftError::ZeroOpeningPrice.into());
                }
            }
            NegotiationKind::LetterOfIntention => {
                if self.letter_of_intention_doc_ref.is_none() {
                    return Err(DraftError::MissingField("letter_of_intention_doc_ref").into());
                }
            }
        }

        Ok(InspectionCase {
            case_id: utils::new_uuid_to_bech32("case_")?,
            property_id,
            owner_id,
            buyer_id,
            requested_by,
            assigned_field_agent: self.assigned_field_agent,
            transaction_ref,
            negotiation_kind,
            mode,
            status: Status::PendingTransaction,
            negotiation_price: self.opening_price,
            letter_of_intention_doc_ref: self.letter_of_intention_doc_ref,
            counter_count: 0,
            // settlement confirmation is an admin-side action
            pending_response_from: routing::next_responder(Status::PendingTransaction, None),
            approve_letter_of_intention: None,
            scheduled_for: None,
            inspection_outcome: None,
            reason_for_rejection_or_cancellation: None,
            history: vec![],
            version: 0,
        })
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}
impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}
impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
