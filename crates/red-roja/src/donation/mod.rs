//! Donor eligibility, blood-type compatibility and the donation workflow.
//!
//! The engine ([`blood_type`], [`eligibility`], [`matching`], [`workflow`]) is pure and
//! synchronous: it validates and mutates caller-supplied entities and never logs.
//! [`DonationService`] is the calling layer. It loads rows through a
//! [`DonationRepository`], runs a transition, commits the result atomically and sends
//! notifications.

pub mod blood_type;
pub mod dates;
pub mod domain;
pub mod eligibility;
pub mod matching;
pub mod repository;
pub mod router;
pub mod service;
mod violation;
pub mod workflow;

#[cfg(test)]
mod tests;

pub use blood_type::{
    compatible, compatible_donor_types, compatible_recipient_types, BloodType, RhFactor,
};
pub use domain::{
    AccountId, CancellationReason, DonationId, DonationRecord, DonationRequest, DonationStatus,
    MedicalProfile, RequestDraft, RequestId, RequestPriority, RequestStatus, ScheduleDraft,
    UserRole,
};
pub use eligibility::{
    EligibilityConfig, EligibilityDecision, EligibilityPolicy, IneligibilityReason,
    RegistrationRejection,
};
pub use matching::{
    compatible_donors, compatible_donors_for_label, order_by_proximity, requests_for_donor,
    DonorCandidate, GeoPoint,
};
pub use repository::{
    DonationRepository, DonationWrite, Notification, NotificationError, NotificationKind,
    Notifier, ProfileWrite, RepositoryError, RequestWrite, WorkflowCommit,
};
pub use router::{donation_router, status_for};
pub use service::{DonationOutcome, DonationService, DonationServiceError};
pub use violation::DonationRuleViolation;
pub use workflow::{DonationWorkflow, TransitionSummary};
