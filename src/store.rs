//! Booking store: the durable record of one inspection/negotiation
//! case and its history.
//!
//! Values are minicbor-encoded case records keyed by case id. Saves go
//! through sled's compare-and-swap against the raw bytes the caller
//! last loaded, so concurrent writers race on the store instead of
//! holding locks; the loser gets `Conflict` and re-evaluates guards
//! against fresh state. History lives inside the record, which makes
//! the append atomic with the save.
use super::case::InspectionCase;
use super::error::WorkflowError;
use sled::IVec;
use std::sync::Arc;

/// Opaque witness of the encoding a case was loaded with. Required to
/// save; a stale token yields `Conflict`.
#[derive(Debug, Clone)]
pub struct VersionToken(IVec);

pub struct BookingStore {
    instance: Arc<sled::Db>,
}

impl BookingStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    /// Insert a freshly built case. Fails with `Conflict` if the id is
    /// already taken, which should never happen with uuid7 ids.
    pub fn create(&self, case: &InspectionCase) -> Result<VersionToken, WorkflowError> {
        let bytes = encode(case)?;
        match self.instance.compare_and_swap(
            case.case_id.as_bytes(),
            None as Option<&[u8]>,
            Some(bytes.clone()),
        )? {
            Ok(()) => Ok(VersionToken(bytes.into())),
            Err(_) => Err(WorkflowError::Conflict),
        }
    }

    /// Load a case together with the version token to save it with.
    pub fn load(&self, case_id: &str) -> Result<(InspectionCase, VersionToken), WorkflowError> {
        let bytes = self
            .instance
            .get(case_id.as_bytes())?
            .ok_or_else(|| WorkflowError::NotFound(case_id.to_string()))?;
        let case = decode(&bytes)?;

        Ok((case, VersionToken(bytes)))
    }

    /// Compare-and-swap save. Bumps the record version on success and
    /// returns the case as persisted; a lost race returns `Conflict`
    /// and persists nothing.
    pub fn save(
        &self,
        mut case: InspectionCase,
        token: VersionToken,
    ) -> Result<(InspectionCase, VersionToken), WorkflowError> {
        case.version += 1;
        let bytes = encode(&case)?;
        match self.instance.compare_and_swap(
            case.case_id.as_bytes(),
            Some(token.0),
            Some(bytes.clone()),
        )? {
            Ok(()) => Ok((case, VersionToken(bytes.into()))),
            Err(_) => Err(WorkflowError::Conflict),
        }
    }
}

fn encode(case: &InspectionCase) -> Result<Vec<u8>, WorkflowError> {
    minicbor::to_vec(case).map_err(|e| WorkflowError::Codec(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<InspectionCase, WorkflowError> {
    minicbor::decode(bytes).map_err(|e| WorkflowError::Codec(e.to_string()))
}
