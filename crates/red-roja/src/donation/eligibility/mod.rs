mod config;
mod registration;
mod rules;

pub use config::{
    EligibilityConfig, DEFAULT_COOLDOWN_DAYS, DEFAULT_MINIMUM_AGE, DEFAULT_MINIMUM_WEIGHT_KG,
};
pub use registration::RegistrationRejection;

use chrono::NaiveDate;
use serde::Serialize;

use super::dates::age_on;
use super::domain::{MedicalProfile, UserRole};
use super::DonationRuleViolation;

/// Stateless policy deciding whether a donor may give blood on a given day.
#[derive(Debug, Clone, Default)]
pub struct EligibilityPolicy {
    config: EligibilityConfig,
}

impl EligibilityPolicy {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    /// Evaluate fitness first, then cooldown. The countdown is always reported.
    pub fn can_donate(&self, profile: &MedicalProfile, today: NaiveDate) -> EligibilityDecision {
        let days_until_eligible =
            rules::cooldown_remaining(profile, today, self.config.cooldown_days);

        let reason = if !rules::fitness_holds(profile, today) {
            Some(IneligibilityReason::NotFit)
        } else if days_until_eligible > 0 {
            profile
                .last_donation_on
                .map(|last_donation_on| IneligibilityReason::CooldownActive { last_donation_on })
        } else {
            None
        };

        EligibilityDecision {
            eligible: reason.is_none(),
            reason,
            days_until_eligible,
        }
    }

    pub fn ensure_can_donate(
        &self,
        profile: &MedicalProfile,
        today: NaiveDate,
    ) -> Result<(), DonationRuleViolation> {
        self.can_donate(profile, today).into_result()
    }

    /// Donor onboarding gate: adult and at least the minimum weight.
    pub fn can_register_as_donor(&self, age: u32, weight_kg: Option<f64>) -> bool {
        registration::check_registration(&self.config, UserRole::Donante, age, weight_kg).is_ok()
    }

    pub fn check_registration(
        &self,
        role: UserRole,
        age: u32,
        weight_kg: Option<f64>,
    ) -> Result<(), RegistrationRejection> {
        registration::check_registration(&self.config, role, age, weight_kg)
    }

    /// Same gate, computing the age from a date of birth.
    pub fn registration_check(
        &self,
        role: UserRole,
        birth_date: NaiveDate,
        weight_kg: Option<f64>,
        today: NaiveDate,
    ) -> Result<(), RegistrationRejection> {
        self.check_registration(role, age_on(birth_date, today), weight_kg)
    }
}

/// Outcome of [`EligibilityPolicy::can_donate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityDecision {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibilityReason>,
    pub days_until_eligible: u32,
}

impl EligibilityDecision {
    pub fn into_result(self) -> Result<(), DonationRuleViolation> {
        match self.reason {
            None => Ok(()),
            Some(IneligibilityReason::NotFit) => Err(DonationRuleViolation::NotFit),
            Some(IneligibilityReason::CooldownActive { last_donation_on }) => {
                Err(DonationRuleViolation::CooldownActive {
                    days_until_eligible: self.days_until_eligible,
                    last_donation_on,
                })
            }
        }
    }

    pub fn summary(&self) -> String {
        match &self.reason {
            None => "eligible to donate".to_string(),
            Some(IneligibilityReason::NotFit) => {
                "medical fitness certificate missing or expired".to_string()
            }
            Some(IneligibilityReason::CooldownActive { .. }) => {
                format!("eligible again in {} day(s)", self.days_until_eligible)
            }
        }
    }
}

/// First failing rule, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum IneligibilityReason {
    NotFit,
    CooldownActive { last_donation_on: NaiveDate },
}
