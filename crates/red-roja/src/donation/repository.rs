use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{
    AccountId, DonationId, DonationRecord, DonationRequest, DonationStatus, MedicalProfile,
    RequestId, RequestStatus,
};

/// Storage abstraction consumed by the service layer, never by the engine.
pub trait DonationRepository: Send + Sync {
    fn fetch_profile(&self, donor_id: &AccountId)
        -> Result<Option<MedicalProfile>, RepositoryError>;
    fn donor_profiles(&self) -> Result<Vec<MedicalProfile>, RepositoryError>;
    fn fetch_request(&self, id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError>;
    fn requests(&self) -> Result<Vec<DonationRequest>, RepositoryError>;
    fn fetch_donation(&self, id: &DonationId) -> Result<Option<DonationRecord>, RepositoryError>;
    fn insert_request(&self, request: DonationRequest) -> Result<DonationRequest, RepositoryError>;
    /// Apply every write in `commit` or none of them. Each write carries the status the
    /// caller read; a mismatch must abort the whole commit with the matching `Stale*` error.
    fn commit(&self, commit: WorkflowCommit) -> Result<(), RepositoryError>;
}

/// One transaction's worth of state changes.
#[derive(Debug, Clone, Default)]
pub struct WorkflowCommit {
    pub request: Option<RequestWrite>,
    pub donation: Option<DonationWrite>,
    pub profile: Option<ProfileWrite>,
}

#[derive(Debug, Clone)]
pub struct RequestWrite {
    pub request: DonationRequest,
    pub expected_status: RequestStatus,
}

#[derive(Debug, Clone)]
pub enum DonationWrite {
    Insert(DonationRecord),
    Update {
        record: DonationRecord,
        expected_status: DonationStatus,
    },
}

impl DonationWrite {
    pub fn record(&self) -> &DonationRecord {
        match self {
            DonationWrite::Insert(record) => record,
            DonationWrite::Update { record, .. } => record,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileWrite {
    pub profile: MedicalProfile,
    pub expected_total_donations: u32,
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("request changed concurrently (now {})", .current.label())]
    StaleRequest { current: RequestStatus },
    #[error("donation changed concurrently (now {})", .current.label())]
    StaleDonation { current: DonationStatus },
    #[error("medical profile changed concurrently")]
    StaleProfile,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound notification hook (e-mail, push, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Notification templates, named after the store's `notificacion.tipo` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SolicitudUrgente,
    ConfirmacionDonacion,
    Agradecimiento,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: AccountId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    pub details: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
