use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    AccountId, CancellationReason, DonationId, DonationRecord, DonationRequest, DonationStatus,
    MedicalProfile, RequestDraft, RequestId, ScheduleDraft, UserRole,
};
use super::eligibility::{
    EligibilityConfig, EligibilityDecision, EligibilityPolicy, RegistrationRejection,
};
use super::matching::{compatible_donors, requests_for_donor, DonorCandidate};
use super::repository::{
    DonationRepository, DonationWrite, Notification, NotificationKind, Notifier, ProfileWrite,
    RepositoryError, RequestWrite, WorkflowCommit,
};
use super::workflow::DonationWorkflow;
use super::DonationRuleViolation;

/// Service loading entities, running the workflow and persisting its result.
pub struct DonationService<R, N> {
    workflow: Arc<DonationWorkflow>,
    repository: Arc<R>,
    notifier: Arc<N>,
    request_sequence: AtomicU64,
    donation_sequence: AtomicU64,
}

/// State after a donation transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DonationOutcome {
    pub donation: DonationRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<DonationRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<MedicalProfile>,
}

impl<R, N> DonationService<R, N>
where
    R: DonationRepository + 'static,
    N: Notifier + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>, config: EligibilityConfig) -> Self {
        let workflow = DonationWorkflow::new(EligibilityPolicy::new(config));
        Self {
            workflow: Arc::new(workflow),
            repository,
            notifier,
            request_sequence: AtomicU64::new(1),
            donation_sequence: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        self.workflow.policy()
    }

    // Sequences are per instance, so identifiers already in the store are skipped.
    fn next_request_id(&self) -> Result<RequestId, DonationServiceError> {
        loop {
            let seq = self.request_sequence.fetch_add(1, Ordering::Relaxed);
            let id = RequestId(format!("sol-{seq:06}"));
            if self.repository.fetch_request(&id)?.is_none() {
                return Ok(id);
            }
        }
    }

    fn next_donation_id(&self) -> Result<DonationId, DonationServiceError> {
        loop {
            let seq = self.donation_sequence.fetch_add(1, Ordering::Relaxed);
            let id = DonationId(format!("don-{seq:06}"));
            if self.repository.fetch_donation(&id)?.is_none() {
                return Ok(id);
            }
        }
    }

    fn load_profile(&self, donor_id: &AccountId) -> Result<MedicalProfile, DonationServiceError> {
        let profile = self
            .repository
            .fetch_profile(donor_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(profile)
    }

    fn load_request(&self, id: &RequestId) -> Result<DonationRequest, DonationServiceError> {
        let request = self
            .repository
            .fetch_request(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(request)
    }

    fn load_donation(&self, id: &DonationId) -> Result<DonationRecord, DonationServiceError> {
        let record = self
            .repository
            .fetch_donation(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Current eligibility of a donor, re-evaluated from the stored profile.
    pub fn eligibility(
        &self,
        donor_id: &AccountId,
        today: NaiveDate,
    ) -> Result<EligibilityDecision, DonationServiceError> {
        let profile = self.load_profile(donor_id)?;
        Ok(self.policy().can_donate(&profile, today))
    }

    pub fn check_registration(
        &self,
        role: UserRole,
        birth_date: NaiveDate,
        weight_kg: Option<f64>,
        today: NaiveDate,
    ) -> Result<(), RegistrationRejection> {
        self.policy()
            .registration_check(role, birth_date, weight_kg, today)
    }

    /// Post a new request; urgent ones are pushed to every eligible compatible donor.
    pub fn create_request(
        &self,
        requester_id: AccountId,
        draft: RequestDraft,
        today: NaiveDate,
    ) -> Result<DonationRequest, DonationServiceError> {
        let stored = retry_on_id_conflict(|| {
            let request = self.workflow.open_request(
                self.next_request_id()?,
                requester_id.clone(),
                draft.clone(),
                today,
            )?;
            Ok(self.repository.insert_request(request)?)
        })?;
        info!(request_id = %stored.id.0, blood_type = %stored.required_type, priority = stored.priority.label(), "blood request opened");

        if stored.priority.is_urgent() {
            let donors = self.eligible_compatible_donors(&stored, today)?;
            for donor_id in donors {
                let mut details = BTreeMap::new();
                details.insert("tipo_sangre".to_string(), stored.required_type.to_string());
                details.insert("unidades".to_string(), stored.units_required.to_string());
                details.insert("fecha_necesidad".to_string(), stored.needed_on.to_string());
                if let Some(hospital) = &stored.hospital {
                    details.insert("hospital".to_string(), hospital.clone());
                }
                self.dispatch(Notification {
                    kind: NotificationKind::SolicitudUrgente,
                    recipient: donor_id,
                    request_id: Some(stored.id.clone()),
                    details,
                });
            }
        }

        Ok(stored)
    }

    /// Donors able to answer a request today, in repository order.
    pub fn compatible_donors(
        &self,
        request_id: &RequestId,
        today: NaiveDate,
    ) -> Result<Vec<AccountId>, DonationServiceError> {
        let request = self.load_request(request_id)?;
        self.eligible_compatible_donors(&request, today)
    }

    fn eligible_compatible_donors(
        &self,
        request: &DonationRequest,
        today: NaiveDate,
    ) -> Result<Vec<AccountId>, DonationServiceError> {
        let candidates: Vec<DonorCandidate> = self
            .repository
            .donor_profiles()?
            .into_iter()
            .map(|profile| {
                let eligible = self.policy().can_donate(&profile, today).eligible;
                DonorCandidate::new(profile.donor_id, profile.blood_type, eligible)
            })
            .collect();

        let matched = compatible_donors(request.required_type, &candidates);
        debug!(request_id = %request.id.0, candidates = candidates.len(), matched = matched.len(), "matched donors");
        Ok(matched)
    }

    /// Open public requests the donor could answer.
    pub fn open_requests_for(
        &self,
        donor_id: &AccountId,
    ) -> Result<Vec<DonationRequest>, DonationServiceError> {
        let profile = self.load_profile(donor_id)?;
        let requests = self.repository.requests()?;
        Ok(requests_for_donor(profile.blood_type, &requests))
    }

    /// A donor answers a pending request.
    pub fn respond_to_request(
        &self,
        request_id: &RequestId,
        donor_id: &AccountId,
        today: NaiveDate,
    ) -> Result<DonationOutcome, DonationServiceError> {
        let profile = self.load_profile(donor_id)?;
        let loaded = self.load_request(request_id)?;
        let expected_status = loaded.status;

        let (request, record) = retry_on_id_conflict(|| {
            let mut request = loaded.clone();
            let record = self.workflow.respond_to_request(
                self.next_donation_id()?,
                &profile,
                &mut request,
                today,
            )?;

            self.repository
                .commit(WorkflowCommit {
                    request: Some(RequestWrite {
                        request: request.clone(),
                        expected_status,
                    }),
                    donation: Some(DonationWrite::Insert(record.clone())),
                    profile: None,
                })
                .map_err(stale_request_as_not_pending)?;
            Ok((request, record))
        })?;

        info!(request_id = %request.id.0, donation_id = %record.id.0, donor_id = %donor_id.0, "donor responded to request");
        self.confirm(&record);

        Ok(DonationOutcome {
            donation: record,
            request: Some(request),
            profile: None,
        })
    }

    /// A donor books a donation outside any request.
    pub fn schedule_donation(
        &self,
        donor_id: &AccountId,
        draft: ScheduleDraft,
        today: NaiveDate,
    ) -> Result<DonationRecord, DonationServiceError> {
        let profile = self.load_profile(donor_id)?;
        let record = retry_on_id_conflict(|| {
            let record = self.workflow.schedule_donation(
                self.next_donation_id()?,
                &profile,
                draft.clone(),
                today,
            )?;

            self.repository.commit(WorkflowCommit {
                donation: Some(DonationWrite::Insert(record.clone())),
                ..WorkflowCommit::default()
            })?;
            Ok(record)
        })?;

        info!(donation_id = %record.id.0, donor_id = %donor_id.0, scheduled_on = %record.scheduled_on, "donation scheduled");
        self.confirm(&record);
        Ok(record)
    }

    /// Mark a scheduled donation as given and credit the donor.
    pub fn complete_donation(
        &self,
        donation_id: &DonationId,
    ) -> Result<DonationOutcome, DonationServiceError> {
        let mut record = self.load_donation(donation_id)?;
        let mut profile = self.load_profile(&record.donor_id)?;
        let mut request = match &record.request_id {
            Some(id) => Some(self.load_request(id)?),
            None => None,
        };

        let expected_donation = record.status;
        let expected_total_donations = profile.total_donations;
        let expected_request = request.as_ref().map(|request| request.status);

        let summary =
            self.workflow
                .complete_donation(&mut record, &mut profile, request.as_mut())?;

        self.repository
            .commit(WorkflowCommit {
                request: request
                    .clone()
                    .zip(expected_request)
                    .map(|(request, expected_status)| RequestWrite {
                        request,
                        expected_status,
                    }),
                donation: Some(DonationWrite::Update {
                    record: record.clone(),
                    expected_status: expected_donation,
                }),
                profile: Some(ProfileWrite {
                    profile: profile.clone(),
                    expected_total_donations,
                }),
            })
            .map_err(stale_donation_as_violation)?;

        info!(donation_id = %record.id.0, donor_id = %record.donor_id.0, total_donations = profile.total_donations, request_status = ?summary.request_status, "donation completed");

        let mut details = BTreeMap::new();
        details.insert("fecha_donacion".to_string(), record.scheduled_on.to_string());
        details.insert(
            "total_donaciones".to_string(),
            profile.total_donations.to_string(),
        );
        self.dispatch(Notification {
            kind: NotificationKind::Agradecimiento,
            recipient: record.donor_id.clone(),
            request_id: record.request_id.clone(),
            details,
        });

        Ok(DonationOutcome {
            donation: record,
            request,
            profile: Some(profile),
        })
    }

    /// Cancel a scheduled donation or record a no-show.
    pub fn cancel_donation(
        &self,
        donation_id: &DonationId,
        reason: CancellationReason,
    ) -> Result<DonationOutcome, DonationServiceError> {
        let mut record = self.load_donation(donation_id)?;
        let mut request = match &record.request_id {
            Some(id) => Some(self.load_request(id)?),
            None => None,
        };

        let expected_donation = record.status;
        let expected_request = request.as_ref().map(|request| request.status);

        let summary = self
            .workflow
            .cancel_donation(&mut record, request.as_mut(), reason)?;

        self.repository
            .commit(WorkflowCommit {
                request: request
                    .clone()
                    .zip(expected_request)
                    .map(|(request, expected_status)| RequestWrite {
                        request,
                        expected_status,
                    }),
                donation: Some(DonationWrite::Update {
                    record: record.clone(),
                    expected_status: expected_donation,
                }),
                profile: None,
            })
            .map_err(stale_donation_as_violation)?;

        info!(donation_id = %record.id.0, status = record.status.label(), request_status = ?summary.request_status, "donation cancelled");

        Ok(DonationOutcome {
            donation: record,
            request,
            profile: None,
        })
    }

    /// The requester withdraws an open request.
    pub fn cancel_request(
        &self,
        request_id: &RequestId,
    ) -> Result<DonationRequest, DonationServiceError> {
        let mut request = self.load_request(request_id)?;
        let expected_status = request.status;

        self.workflow.cancel_request(&mut request)?;

        self.repository
            .commit(WorkflowCommit {
                request: Some(RequestWrite {
                    request: request.clone(),
                    expected_status,
                }),
                ..WorkflowCommit::default()
            })
            .map_err(|error| match error {
                RepositoryError::StaleRequest { current } if current.is_terminal() => {
                    DonationServiceError::Rule(DonationRuleViolation::RequestClosed {
                        status: current,
                    })
                }
                other => DonationServiceError::Repository(other),
            })?;

        info!(request_id = %request.id.0, "blood request cancelled");
        Ok(request)
    }

    fn confirm(&self, record: &DonationRecord) {
        let mut details = BTreeMap::new();
        details.insert("fecha_donacion".to_string(), record.scheduled_on.to_string());
        details.insert("tipo_sangre".to_string(), record.blood_type.to_string());
        if let Some(location) = &record.location {
            details.insert("ubicacion".to_string(), location.clone());
        }
        self.dispatch(Notification {
            kind: NotificationKind::ConfirmacionDonacion,
            recipient: record.donor_id.clone(),
            request_id: record.request_id.clone(),
            details,
        });
    }

    // Delivery happens after the commit, so a failure is reported but never undoes it.
    fn dispatch(&self, notification: Notification) {
        let kind = notification.kind;
        let recipient = notification.recipient.0.clone();
        if let Err(error) = self.notifier.notify(notification) {
            warn!(?kind, %recipient, %error, "notification delivery failed");
        }
    }
}

const ID_ATTEMPTS: usize = 8;

// Another writer sharing the store can claim an identifier between the lookup and the insert.
fn retry_on_id_conflict<T>(
    mut attempt: impl FnMut() -> Result<T, DonationServiceError>,
) -> Result<T, DonationServiceError> {
    let mut remaining = ID_ATTEMPTS;
    loop {
        match attempt() {
            Err(DonationServiceError::Repository(RepositoryError::Conflict)) if remaining > 1 => {
                remaining -= 1;
                debug!(remaining, "identifier already taken, retrying");
            }
            outcome => return outcome,
        }
    }
}

fn stale_request_as_not_pending(error: RepositoryError) -> DonationServiceError {
    match error {
        RepositoryError::StaleRequest { current } => {
            DonationServiceError::Rule(DonationRuleViolation::RequestNotPending { status: current })
        }
        other => DonationServiceError::Repository(other),
    }
}

fn stale_donation_as_violation(error: RepositoryError) -> DonationServiceError {
    match error {
        RepositoryError::StaleDonation {
            current: DonationStatus::Completada,
        } => DonationServiceError::Rule(DonationRuleViolation::AlreadyCompleted),
        RepositoryError::StaleDonation { current } => {
            DonationServiceError::Rule(DonationRuleViolation::NotProgramada { status: current })
        }
        other => DonationServiceError::Repository(other),
    }
}

/// Error raised by the donation service.
#[derive(Debug, thiserror::Error)]
pub enum DonationServiceError {
    #[error(transparent)]
    Rule(#[from] DonationRuleViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
