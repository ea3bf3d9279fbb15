use chrono::NaiveDate;

use super::super::dates::days_between;
use super::super::domain::MedicalProfile;

/// Fitness holds when the flag is set and any recorded certificate expiry is not yet past.
pub(crate) fn fitness_holds(profile: &MedicalProfile, today: NaiveDate) -> bool {
    if !profile.medically_fit {
        return false;
    }
    match profile.fitness_expires_on {
        Some(expires_on) => expires_on >= today,
        None => true,
    }
}

/// Days left before the cooldown since the last completed donation elapses.
pub(crate) fn cooldown_remaining(
    profile: &MedicalProfile,
    today: NaiveDate,
    cooldown_days: u32,
) -> u32 {
    let Some(last_donation_on) = profile.last_donation_on else {
        return 0;
    };

    let elapsed = days_between(last_donation_on, today);
    let remaining = i64::from(cooldown_days) - elapsed;
    remaining.clamp(0, i64::from(u32::MAX)) as u32
}
