use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use red_roja::donation::dates::parse_calendar_date;
use red_roja::donation::{
    AccountId, BloodType, DonationId, DonationRecord, DonationRepository, DonationRequest,
    DonationWrite, MedicalProfile, Notification, NotificationError, Notifier, RepositoryError,
    RequestId, WorkflowCommit,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Tables {
    profiles: HashMap<AccountId, MedicalProfile>,
    registration_order: Vec<AccountId>,
    requests: HashMap<RequestId, DonationRequest>,
    donations: HashMap<DonationId, DonationRecord>,
}

/// Process-local store. One mutex guards every table so a commit is all-or-nothing.
#[derive(Default, Clone)]
pub(crate) struct InMemoryDonationRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryDonationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    pub(crate) fn register_profile(&self, profile: MedicalProfile) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.profiles.contains_key(&profile.donor_id) {
            tables.registration_order.push(profile.donor_id.clone());
        }
        tables.profiles.insert(profile.donor_id.clone(), profile);
        Ok(())
    }
}

impl DonationRepository for InMemoryDonationRepository {
    fn fetch_profile(
        &self,
        donor_id: &AccountId,
    ) -> Result<Option<MedicalProfile>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables.profiles.get(donor_id).cloned())
    }

    fn donor_profiles(&self) -> Result<Vec<MedicalProfile>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .registration_order
            .iter()
            .filter_map(|id| tables.profiles.get(id).cloned())
            .collect())
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<DonationRequest>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables.requests.get(id).cloned())
    }

    fn requests(&self) -> Result<Vec<DonationRequest>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables.requests.values().cloned().collect())
    }

    fn fetch_donation(&self, id: &DonationId) -> Result<Option<DonationRecord>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables.donations.get(id).cloned())
    }

    fn insert_request(&self, request: DonationRequest) -> Result<DonationRequest, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn commit(&self, commit: WorkflowCommit) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;

        // Validate every guard before the first write.
        if let Some(write) = &commit.request {
            let stored = tables
                .requests
                .get(&write.request.id)
                .ok_or(RepositoryError::NotFound)?;
            if stored.status != write.expected_status {
                return Err(RepositoryError::StaleRequest {
                    current: stored.status,
                });
            }
        }
        match &commit.donation {
            Some(DonationWrite::Insert(record)) if tables.donations.contains_key(&record.id) => {
                return Err(RepositoryError::Conflict);
            }
            Some(DonationWrite::Update {
                record,
                expected_status,
            }) => {
                let stored = tables
                    .donations
                    .get(&record.id)
                    .ok_or(RepositoryError::NotFound)?;
                if stored.status != *expected_status {
                    return Err(RepositoryError::StaleDonation {
                        current: stored.status,
                    });
                }
            }
            _ => {}
        }
        if let Some(write) = &commit.profile {
            let stored = tables
                .profiles
                .get(&write.profile.donor_id)
                .ok_or(RepositoryError::NotFound)?;
            if stored.total_donations != write.expected_total_donations {
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

/// Stands in for the e-mail sender: logs each notification and keeps it for inspection.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotifier {
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl LoggingNotifier {
    pub(crate) fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            kind = ?notification.kind,
            recipient = %notification.recipient.0,
            request_id = ?notification.request_id.as_ref().map(|id| id.0.as_str()),
            "notification delivered"
        );
        self.delivered
            .lock()
            .map_err(|_| NotificationError::Transport("notifier mutex poisoned".to_string()))?
            .push(notification);
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    parse_calendar_date(raw).map_err(|err| err.to_string())
}

pub(crate) fn parse_blood_type(raw: &str) -> Result<BloodType, String> {
    raw.parse::<BloodType>().map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use red_roja::donation::{
        DonationStatus, ProfileWrite, RequestPriority, RequestStatus, RequestWrite,
    };

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn profile() -> MedicalProfile {
        let mut profile = MedicalProfile::new(AccountId("usr-1".to_string()), BloodType::ONegative);
        profile.weight_kg = Some(70.0);
        profile.medically_fit = true;
        profile
    }

    fn request(status: RequestStatus) -> DonationRequest {
        DonationRequest {
            id: RequestId("sol-000001".to_string()),
            requester_id: AccountId("usr-receptor".to_string()),
            required_type: BloodType::AbPositive,
            units_required: 1,
            priority: RequestPriority::Urgente,
            status,
            public: true,
            needed_on: date(2025, 3, 14),
            hospital: None,
            reason: None,
            completed_on: None,
        }
    }

    fn record(id: &str, status: DonationStatus) -> DonationRecord {
        DonationRecord {
            id: DonationId(id.to_string()),
            donor_id: AccountId("usr-1".to_string()),
            request_id: Some(RequestId("sol-000001".to_string())),
            scheduled_on: date(2025, 3, 14),
            units: 1,
            blood_type: BloodType::ONegative,
            status,
            first_time: true,
            location: None,
            notes: None,
        }
    }

    fn take_request(status: RequestStatus, donation_id: &str) -> WorkflowCommit {
        WorkflowCommit {
            request: Some(RequestWrite {
                request: request(RequestStatus::EnProceso),
                expected_status: status,
            }),
            donation: Some(DonationWrite::Insert(record(
                donation_id,
                DonationStatus::Programada,
            ))),
            profile: None,
        }
    }

    fn seeded() -> InMemoryDonationRepository {
        let repository = InMemoryDonationRepository::default();
        repository.register_profile(profile()).expect("profile stored");
        repository
            .insert_request(request(RequestStatus::Pendiente))
            .expect("request stored");
        repository
    }

    fn stored_request(repository: &InMemoryDonationRepository) -> DonationRequest {
        repository
            .fetch_request(&RequestId("sol-000001".to_string()))
            .expect("store available")
            .expect("request stored")
    }

    #[test]
    fn second_writer_on_a_taken_request_is_stale() {
        let repository = seeded();
        repository
            .commit(take_request(RequestStatus::Pendiente, "don-000001"))
            .expect("first commit applies");

        match repository.commit(take_request(RequestStatus::Pendiente, "don-000002")) {
            Err(RepositoryError::StaleRequest { current }) => {
                assert_eq!(current, RequestStatus::EnProceso)
            }
            other => panic!("expected stale request, got {other:?}"),
        }
        assert!(repository
            .fetch_donation(&DonationId("don-000002".to_string()))
            .expect("store available")
            .is_none());
    }

    #[test]
    fn stale_donation_aborts_request_and_profile_writes() {
        let repository = seeded();
        repository
            .commit(take_request(RequestStatus::Pendiente, "don-000001"))
            .expect("response applies");
        repository
            .commit(WorkflowCommit {
                donation: Some(DonationWrite::Update {
                    record: record("don-000001", DonationStatus::Completada),
                    expected_status: DonationStatus::Programada,
                }),
                ..WorkflowCommit::default()
            })
            .expect("completion applies");

        let mut credited = profile();
        credited.total_donations = 1;
        credited.last_donation_on = Some(date(2025, 3, 14));
        let mut closed = request(RequestStatus::Completada);
        closed.completed_on = Some(date(2025, 3, 14));
        let replay = WorkflowCommit {
            request: Some(RequestWrite {
                request: closed,
                expected_status: RequestStatus::EnProceso,
            }),
            donation: Some(DonationWrite::Update {
                record: record("don-000001", DonationStatus::Completada),
                expected_status: DonationStatus::Programada,
            }),
            profile: Some(ProfileWrite {
                profile: credited,
                expected_total_donations: 0,
            }),
        };

        match repository.commit(replay) {
            Err(RepositoryError::StaleDonation { current }) => {
                assert_eq!(current, DonationStatus::Completada)
            }
            other => panic!("expected stale donation, got {other:?}"),
        }
        assert_eq!(stored_request(&repository).status, RequestStatus::EnProceso);
        let stored = repository
            .fetch_profile(&AccountId("usr-1".to_string()))
            .expect("store available")
            .expect("profile stored");
        assert_eq!(stored.total_donations, 0);
        assert_eq!(stored.last_donation_on, None);
    }

    #[test]
    fn stale_profile_leaves_every_table_untouched() {
        let repository = seeded();
        let mut credited = profile();
        credited.total_donations = 2;

        let commit = WorkflowCommit {
            profile: Some(ProfileWrite {
                profile: credited,
                expected_total_donations: 1,
            }),
            ..take_request(RequestStatus::Pendiente, "don-000001")
        };
        assert!(matches!(
            repository.commit(commit),
            Err(RepositoryError::StaleProfile)
        ));
        assert_eq!(stored_request(&repository).status, RequestStatus::Pendiente);
        assert!(repository
            .fetch_donation(&DonationId("don-000001".to_string()))
            .expect("store available")
            .is_none());
    }

    #[test]
    fn duplicate_identifiers_conflict() {
        let repository = seeded();
        assert!(matches!(
            repository.insert_request(request(RequestStatus::Pendiente)),
            Err(RepositoryError::Conflict)
        ));

        repository
            .commit(take_request(RequestStatus::Pendiente, "don-000001"))
            .expect("response applies");
        let duplicate = WorkflowCommit {
            donation: Some(DonationWrite::Insert(record(
                "don-000001",
                DonationStatus::Programada,
            ))),
            ..WorkflowCommit::default()
        };
        assert!(matches!(
            repository.commit(duplicate),
            Err(RepositoryError::Conflict)
        ));
    }

    #[test]
    fn writes_against_missing_rows_are_not_found() {
        let repository = InMemoryDonationRepository::default();
        assert!(matches!(
            repository.commit(take_request(RequestStatus::Pendiente, "don-000001")),
            Err(RepositoryError::NotFound)
        ));
        assert!(repository.donor_profiles().expect("store available").is_empty());
    }
}
