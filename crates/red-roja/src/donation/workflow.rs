//! State transitions for requests and donation records.
//!
//! Every transition validates all preconditions before touching any entity, so a
//! rejected call leaves the caller's values exactly as they were. Persisting the
//! result under the store's transaction guard is the caller's job.

use chrono::NaiveDate;
use serde::Serialize;

use super::blood_type::compatible_donor_types;
use super::domain::{
    AccountId, CancellationReason, DonationId, DonationRecord, DonationRequest, DonationStatus,
    MedicalProfile, RequestDraft, RequestId, RequestStatus, ScheduleDraft,
};
use super::eligibility::EligibilityPolicy;
use super::DonationRuleViolation;

/// Units recorded when a donor answers a request.
const RESPONSE_UNITS: u32 = 1;

/// Resulting statuses after a transition, for logging and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransitionSummary {
    pub donation_status: DonationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_status: Option<RequestStatus>,
}

/// Pure transition logic guarded by the eligibility policy.
#[derive(Debug, Clone, Default)]
pub struct DonationWorkflow {
    policy: EligibilityPolicy,
}

impl DonationWorkflow {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Create a `pendiente` request from a recipient's draft.
    pub fn open_request(
        &self,
        id: RequestId,
        requester_id: AccountId,
        draft: RequestDraft,
        today: NaiveDate,
    ) -> Result<DonationRequest, DonationRuleViolation> {
        if draft.units_required == 0 {
            return Err(DonationRuleViolation::InvalidUnitCount);
        }
        if draft.needed_on < today {
            return Err(DonationRuleViolation::ScheduledInPast {
                scheduled_on: draft.needed_on,
                today,
            });
        }

        Ok(DonationRequest {
            id,
            requester_id,
            required_type: draft.required_type,
            units_required: draft.units_required,
            priority: draft.priority,
            status: RequestStatus::Pendiente,
            public: draft.public,
            needed_on: draft.needed_on,
            hospital: draft.hospital,
            reason: draft.reason,
            completed_on: None,
        })
    }

    /// A donor answers a pending request: schedule a donation and mark the request in progress.
    pub fn respond_to_request(
        &self,
        donation_id: DonationId,
        donor: &MedicalProfile,
        request: &mut DonationRequest,
        today: NaiveDate,
    ) -> Result<DonationRecord, DonationRuleViolation> {
        self.policy.ensure_can_donate(donor, today)?;

        if !compatible_donor_types(request.required_type).contains(&donor.blood_type) {
            return Err(DonationRuleViolation::IncompatibleType {
                donor: donor.blood_type,
                required: request.required_type,
            });
        }

        if request.status != RequestStatus::Pendiente {
            return Err(DonationRuleViolation::RequestNotPending {
                status: request.status,
            });
        }

        let record = DonationRecord {
            id: donation_id,
            donor_id: donor.donor_id.clone(),
            request_id: Some(request.id.clone()),
            scheduled_on: request.needed_on,
            units: RESPONSE_UNITS,
            blood_type: donor.blood_type,
            status: DonationStatus::Programada,
            first_time: donor.is_first_time_donor(),
            location: request.hospital.clone(),
            notes: None,
        };
        request.status = RequestStatus::EnProceso;

        Ok(record)
    }

    /// A donor books a donation that is not tied to any request.
    pub fn schedule_donation(
        &self,
        donation_id: DonationId,
        donor: &MedicalProfile,
        draft: ScheduleDraft,
        today: NaiveDate,
    ) -> Result<DonationRecord, DonationRuleViolation> {
        self.policy.ensure_can_donate(donor, today)?;

        if draft.units == 0 {
            return Err(DonationRuleViolation::InvalidUnitCount);
        }
        if draft.scheduled_on < today {
            return Err(DonationRuleViolation::ScheduledInPast {
                scheduled_on: draft.scheduled_on,
                today,
            });
        }

        Ok(DonationRecord {
            id: donation_id,
            donor_id: donor.donor_id.clone(),
            request_id: None,
            scheduled_on: draft.scheduled_on,
            units: draft.units,
            blood_type: donor.blood_type,
            status: DonationStatus::Programada,
            first_time: donor.is_first_time_donor(),
            location: draft.location,
            notes: draft.notes,
        })
    }

    /// Close a scheduled donation as given, crediting the donor exactly once.
    pub fn complete_donation(
        &self,
        record: &mut DonationRecord,
        donor: &mut MedicalProfile,
        linked_request: Option<&mut DonationRequest>,
    ) -> Result<TransitionSummary, DonationRuleViolation> {
        match record.status {
            DonationStatus::Programada => {}
            DonationStatus::Completada => return Err(DonationRuleViolation::AlreadyCompleted),
            status => return Err(DonationRuleViolation::NotProgramada { status }),
        }
        if donor.donor_id != record.donor_id {
            return Err(DonationRuleViolation::DonorMismatch);
        }
        check_linked_request(record, linked_request.as_deref())?;

        record.status = DonationStatus::Completada;
        donor.record_completed_donation(record.scheduled_on);

        let request_status = linked_request.map(|request| {
            if request.status == RequestStatus::EnProceso {
                request.status = RequestStatus::Completada;
                request.completed_on = Some(record.scheduled_on);
            }
            request.status
        });

        Ok(TransitionSummary {
            donation_status: record.status,
            request_status,
        })
    }

    /// Cancel or mark a no-show; an in-progress linked request reopens for other donors.
    pub fn cancel_donation(
        &self,
        record: &mut DonationRecord,
        linked_request: Option<&mut DonationRequest>,
        reason: CancellationReason,
    ) -> Result<TransitionSummary, DonationRuleViolation> {
        if record.status != DonationStatus::Programada {
            return Err(DonationRuleViolation::NotProgramada {
                status: record.status,
            });
        }
        check_linked_request(record, linked_request.as_deref())?;

        record.status = reason.resulting_status();

        let request_status = linked_request.map(|request| {
            if request.status == RequestStatus::EnProceso {
                request.status = RequestStatus::Pendiente;
            }
            request.status
        });

        Ok(TransitionSummary {
            donation_status: record.status,
            request_status,
        })
    }

    /// The requester withdraws a request that is still open.
    pub fn cancel_request(&self, request: &mut DonationRequest) -> Result<(), DonationRuleViolation> {
        if request.status.is_terminal() {
            return Err(DonationRuleViolation::RequestClosed {
                status: request.status,
            });
        }
        request.status = RequestStatus::Cancelada;
        Ok(())
    }
}

fn check_linked_request(
    record: &DonationRecord,
    linked_request: Option<&DonationRequest>,
) -> Result<(), DonationRuleViolation> {
    match (&record.request_id, linked_request) {
        (None, None) => Ok(()),
        (Some(expected), Some(request)) if *expected == request.id => Ok(()),
        _ => Err(DonationRuleViolation::RequestMismatch),
    }
}
