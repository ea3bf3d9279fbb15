use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::donation::{
    donation_router, AccountId, BloodType, DonationId, DonationRecord, DonationRepository,
    DonationRequest, DonationService, DonationWorkflow, DonationWrite, EligibilityConfig,
    EligibilityPolicy, MedicalProfile, Notification, NotificationError, Notifier, RepositoryError,
    RequestDraft, RequestId, RequestPriority, RequestStatus, WorkflowCommit,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    date(2025, 3, 10)
}

pub(super) fn eligibility_config() -> EligibilityConfig {
    EligibilityConfig::default()
}

pub(super) fn workflow() -> DonationWorkflow {
    DonationWorkflow::new(EligibilityPolicy::new(eligibility_config()))
}

/// A fit donor who has never given blood.
pub(super) fn donor(id: &str, blood_type: BloodType) -> MedicalProfile {
    let mut profile = MedicalProfile::new(AccountId(id.to_string()), blood_type);
    profile.weight_kg = Some(70.0);
    profile.medically_fit = true;
    profile.fitness_expires_on = Some(date(2026, 1, 1));
    profile
}

pub(super) fn donor_last_gave(id: &str, blood_type: BloodType, days_ago: i64) -> MedicalProfile {
    let mut profile = donor(id, blood_type);
    profile.last_donation_on = Some(today() - chrono::Duration::days(days_ago));
    profile.total_donations = 1;
    profile
}

pub(super) fn draft(required_type: BloodType, priority: RequestPriority) -> RequestDraft {
    RequestDraft {
        required_type,
        units_required: 2,
        priority,
        needed_on: date(2025, 3, 14),
        public: true,
        hospital: Some("Hospital Italiano".to_string()),
        reason: Some("Cirugía programada".to_string()),
    }
}

pub(super) fn pending_request(id: &str, required_type: BloodType) -> DonationRequest {
    DonationRequest {
        id: RequestId(id.to_string()),
        requester_id: AccountId("usr-receptor".to_string()),
        required_type,
        units_required: 2,
        priority: RequestPriority::Media,
        status: RequestStatus::Pendiente,
        public: true,
        needed_on: date(2025, 3, 14),
        hospital: Some("Hospital Italiano".to_string()),
        reason: None,
        completed_on: None,
    }
}

pub(super) fn build_service() -> (
    DonationService<MemoryRepository, MemoryNotifier>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = DonationService::new(repository.clone(), notifier.clone(), eligibility_config());
    (service, repository, notifier)
}

pub(super) fn router_with_service(
    service: DonationService<MemoryRepository, MemoryNotifier>,
) -> axum::Router {
    donation_router(Arc::new(service))
}

#[derive(Default)]
struct Tables {
    profiles: HashMap<AccountId, MedicalProfile>,
    // Insertion order is kept so matching results are deterministic.
    profile_order: Vec<AccountId>,
    requests: HashMap<RequestId, DonationRequest>,
    donations: HashMap<DonationId, DonationRecord>,
}

/// In-memory store applying commits atomically with the same status guards as SQL.
#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRepository {
    pub(super) fn put_profile(&self, profile: MedicalProfile) {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        if !tables.profiles.contains_key(&profile.donor_id) {
            tables.profile_order.push(profile.donor_id.clone());
        }
        tables.profiles.insert(profile.donor_id.clone(), profile);
    }

    pub(super) fn put_request(&self, request: DonationRequest) {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        tables.requests.insert(request.id.clone(), request);
    }

    pub(super) fn put_donation(&self, record: DonationRecord) {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        tables.donations.insert(record.id.clone(), record);
    }

    pub(super) fn profile(&self, id: &str) -> MedicalProfile {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        tables
            .profiles
            .get(&AccountId(id.to_string()))
            .cloned()
            .expect("profile stored")
    }

    pub(super) fn request(&self, id: &RequestId) -> DonationRequest {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        tables.requests.get(id).cloned().expect("request stored")
    }

    pub(super) fn donation(&self, id: &DonationId) -> DonationRecord {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        tables.donations.get(id).cloned().expect("donation stored")
    }

    pub(super) fn donation_count(&self) -> usize {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        tables.donations.len()
    }
}

impl DonationRepository for MemoryRepository {
    fn fetch_profile(
        &self,
        donor_id: &AccountId,
    ) -> Result<Option<MedicalProfile>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.profiles.get(donor_id).cloned())
    }

    fn donor_profiles(&self) -> Result<Vec<MedicalProfile>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables
            .profile_order
            .iter()
            .filter_map(|id| tables.profiles.get(id).cloned())
            .collect())
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.requests.get(id).cloned())
    }

    fn requests(&self) -> Result<Vec<DonationRequest>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.requests.values().cloned().collect())
    }

    fn fetch_donation(&self, id: &DonationId) -> Result<Option<DonationRecord>, RepositoryError> {
        let tables = self.tables.lock().expect("repository mutex poisoned");
        Ok(tables.donations.get(id).cloned())
    }

    fn insert_request(&self, request: DonationRequest) -> Result<DonationRequest, RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");
        if tables.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn commit(&self, commit: WorkflowCommit) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().expect("repository mutex poisoned");

        if let Some(write) = &commit.request {
            let current = tables
                .requests
                .get(&write.request.id)
                .ok_or(RepositoryError::NotFound)?;
            if current.status != write.expected_status {
                return Err(RepositoryError::StaleRequest {
                    current: current.status,
                });
            }
        }
        match &commit.donation {
            Some(DonationWrite::Insert(record)) => {
                if tables.donations.contains_key(&record.id) {
                    return Err(RepositoryError::Conflict);
                }
            }
            Some(DonationWrite::Update {
                record,
                expected_status,
            }) => {
                let current = tables
                    .donations
                    .get(&record.id)
                    .ok_or(RepositoryError::NotFound)?;
                if current.status != *expected_status {
                    return Err(RepositoryError::StaleDonation {
                        current: current.status,
                    });
                }
            }
            None => {}
        }
        if let Some(write) = &commit.profile {
            let current = tables
                .profiles
                .get(&write.profile.donor_id)
                .ok_or(RepositoryError::NotFound)?;
            if current.total_donations != write.expected_total_donations {
                return Err(RepositoryError::StaleProfile);
            }
        }

        if let Some(write) = commit.request {
            tables.requests.insert(write.request.id.clone(), write.request);
        }
        if let Some(write) = commit.donation {
            let record = write.record().clone();
            tables.donations.insert(record.id.clone(), record);
        }
        if let Some(write) = commit.profile {
            tables
                .profiles
                .insert(write.profile.donor_id.clone(), write.profile);
        }
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl DonationRepository for UnavailableRepository {
    fn fetch_profile(
        &self,
        _donor_id: &AccountId,
    ) -> Result<Option<MedicalProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn donor_profiles(&self) -> Result<Vec<MedicalProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_request(&self, _id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn requests(&self) -> Result<Vec<DonationRequest>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_donation(&self, _id: &DonationId) -> Result<Option<DonationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_request(&self, _request: DonationRequest) -> Result<DonationRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _commit: WorkflowCommit) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
