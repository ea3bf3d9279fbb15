use serde::Serialize;

use super::super::domain::UserRole;
use super::config::EligibilityConfig;

/// Onboarding gate failures.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RegistrationRejection {
    #[error("must be at least {minimum} years old (currently {age})")]
    Underage { age: u32, minimum: u32 },
    #[error("donors must declare their weight")]
    MissingWeight,
    #[error("minimum weight to donate is {minimum_kg} kg (declared {weight_kg} kg)")]
    Underweight { weight_kg: f64, minimum_kg: f64 },
}

pub(crate) fn check_registration(
    config: &EligibilityConfig,
    role: UserRole,
    age: u32,
    weight_kg: Option<f64>,
) -> Result<(), RegistrationRejection> {
    if age < config.minimum_age {
        return Err(RegistrationRejection::Underage {
            age,
            minimum: config.minimum_age,
        });
    }

    if !role.requires_donor_capability() {
        return Ok(());
    }

    match weight_kg {
        None => Err(RegistrationRejection::MissingWeight),
        Some(weight) if weight >= config.minimum_weight_kg => Ok(()),
        Some(weight) => Err(RegistrationRejection::Underweight {
            weight_kg: weight,
            minimum_kg: config.minimum_weight_kg,
        }),
    }
}
