use chrono::NaiveDate;

use super::blood_type::BloodType;
use super::domain::{DonationStatus, RequestStatus};

/// Business-rule rejections raised by the engine. None of these are transient.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DonationRuleViolation {
    #[error("donor has no valid medical fitness certificate")]
    NotFit,
    #[error("donor must wait {days_until_eligible} more day(s) after the donation on {last_donation_on}")]
    CooldownActive {
        days_until_eligible: u32,
        last_donation_on: NaiveDate,
    },
    #[error("donor type {donor} cannot give to a {required} recipient")]
    IncompatibleType {
        donor: BloodType,
        required: BloodType,
    },
    #[error("unknown blood type '{0}'")]
    UnknownBloodType(String),
    #[error("request is {} and no longer accepts responses", .status.label())]
    RequestNotPending { status: RequestStatus },
    #[error("donation is {} rather than programada", .status.label())]
    NotProgramada { status: DonationStatus },
    #[error("donation was already completed")]
    AlreadyCompleted,
    #[error("donation date {scheduled_on} is before {today}")]
    ScheduledInPast {
        scheduled_on: NaiveDate,
        today: NaiveDate,
    },
    #[error("unit count must be positive")]
    InvalidUnitCount,
    #[error("request is already {}", .status.label())]
    RequestClosed { status: RequestStatus },
    #[error("medical profile does not belong to the donation's donor")]
    DonorMismatch,
    #[error("linked request does not match the donation's request")]
    RequestMismatch,
}

impl DonationRuleViolation {
    /// Stable identifier for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            DonationRuleViolation::NotFit => "not_fit",
            DonationRuleViolation::CooldownActive { .. } => "cooldown_active",
            DonationRuleViolation::IncompatibleType { .. } => "incompatible_type",
            DonationRuleViolation::UnknownBloodType(_) => "unknown_blood_type",
            DonationRuleViolation::RequestNotPending { .. } => "request_not_pending",
            DonationRuleViolation::NotProgramada { .. } => "not_programada",
            DonationRuleViolation::AlreadyCompleted => "already_completed",
            DonationRuleViolation::ScheduledInPast { .. } => "scheduled_in_past",
            DonationRuleViolation::InvalidUnitCount => "invalid_unit_count",
            DonationRuleViolation::RequestClosed { .. } => "request_closed",
            DonationRuleViolation::DonorMismatch => "donor_mismatch",
            DonationRuleViolation::RequestMismatch => "request_mismatch",
        }
    }

    pub const fn days_until_eligible(&self) -> Option<u32> {
        match self {
            DonationRuleViolation::CooldownActive {
                days_until_eligible,
                ..
            } => Some(*days_until_eligible),
            _ => None,
        }
    }
}
