use serde::{Deserialize, Serialize};

pub const DEFAULT_COOLDOWN_DAYS: u32 = 60;
pub const DEFAULT_MINIMUM_AGE: u32 = 18;
pub const DEFAULT_MINIMUM_WEIGHT_KG: f64 = 50.0;

/// Clinical thresholds backing the eligibility policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    pub cooldown_days: u32,
    pub minimum_age: u32,
    pub minimum_weight_kg: f64,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            cooldown_days: DEFAULT_COOLDOWN_DAYS,
            minimum_age: DEFAULT_MINIMUM_AGE,
            minimum_weight_kg: DEFAULT_MINIMUM_WEIGHT_KG,
        }
    }
}
