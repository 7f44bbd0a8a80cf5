//! Nested sub-state for the physical or virtual visit itself, entered
//! once negotiation concludes. Embedded by value in the parent case and
//! driven by its own small transition function, composed into (never
//! flattened with) the parent machine.
use super::case::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestLevel {
    #[n(0)]
    VeryInterested,
    #[n(1)]
    Interested,
    #[n(2)]
    Neutral,
    #[n(3)]
    NotInterested,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    InProgress,
    #[n(2)]
    AwaitingReport,
    #[n(3)]
    Postponed,
    #[n(4)]
    Completed,
    #[n(5)]
    Cancelled,
    #[n(6)]
    Absent,
}

impl ReportStatus {
    /// True once the visit can be folded back into the parent case.
    pub fn is_terminal(self) -> bool {
        matches!(self, ReportStatus::Completed | ReportStatus::Cancelled | ReportStatus::Absent)
    }
}

/// What the field agent files after the visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionReport {
    pub buyer_present: bool,
    pub seller_present: bool,
    pub buyer_interest_level: InterestLevel,
    pub notes: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InspectionOutcome {
    #[n(0)]
    pub buyer_present: bool,
    #[n(1)]
    pub seller_present: bool,
    #[n(2)]
    pub buyer_interest_level: Option<InterestLevel>,
    #[n(3)]
    pub notes: Option<String>,
    #[n(4)]
    pub was_successful: Option<bool>,
    #[n(5)]
    pub started_at: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub completed_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub report_status: ReportStatus,
}

impl InspectionOutcome {
    pub fn new() -> Self {
        Self {
            buyer_present: false,
            seller_present: false,
            buyer_interest_level: None,
            notes: None,
            was_successful: None,
            started_at: None,
            completed_at: None,
            report_status: ReportStatus::Pending,
        }
    }

    /// True only from `Pending`, `Postponed` or `AwaitingReport`; the
    /// parent machine maps a false return to `InvalidTransition`.
    pub fn can_start(&self) -> bool {
        matches!(
            self.report_status,
            ReportStatus::Pending | ReportStatus::Postponed | ReportStatus::AwaitingReport
        )
    }

    pub fn can_submit_report(&self) -> bool {
        matches!(
            self.report_status,
            ReportStatus::InProgress | ReportStatus::AwaitingReport
        )
    }

    /// Mark the visit as underway.
    pub fn start(&mut self, now: TimeStamp<Utc>) {
        self.started_at = Some(now);
        self.report_status = ReportStatus::InProgress;
    }

    /// File the agent's report. Success means both parties were present
    /// and the buyer did not walk away uninterested.
    pub fn submit_report(&mut self, report: InspectionReport, now: TimeStamp<Utc>) {
        let successful = report.buyer_present
            && report.seller_present
            && report.buyer_interest_level != InterestLevel::NotInterested;

        self.buyer_present = report.buyer_present;
        self.seller_present = report.seller_present;
        self.buyer_interest_level = Some(report.buyer_interest_level);
        self.notes = Some(report.notes);
        self.was_successful = Some(successful);
        self.completed_at = Some(now);
        self.report_status = ReportStatus::Completed;
    }

    pub fn cancel(&mut self) {
        self.report_status = ReportStatus::Cancelled;
        self.was_successful = Some(false);
    }

    /// The terminal result folded back into the parent status by `close`.
    pub fn folded_success(&self) -> bool {
        self.was_successful == Some(true)
    }
}

impl Default for InspectionOutcome {
    fn default() -> Self {
        Self::new()
    }
}
