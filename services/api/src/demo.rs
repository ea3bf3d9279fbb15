use crate::infra::{parse_blood_type, parse_date, InMemoryDonationRepository, LoggingNotifier};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use red_roja::config::AppConfig;
use red_roja::donation::{
    compatible, compatible_donor_types, compatible_recipient_types, AccountId, BloodType,
    DonationService, EligibilityConfig, EligibilityPolicy, MedicalProfile, RequestDraft,
    RequestPriority, UserRole,
};
use red_roja::error::AppError;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct CompatibilityArgs {
    /// Only show who can give to and receive from this type (e.g. "O-")
    #[arg(long, value_parser = parse_blood_type)]
    pub(crate) blood_type: Option<BloodType>,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    /// Donor blood type
    #[arg(long, value_parser = parse_blood_type)]
    pub(crate) blood_type: BloodType,
    /// The donor holds a medical fitness certificate
    #[arg(long)]
    pub(crate) fit: bool,
    /// Expiry of the fitness certificate (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) fitness_expires: Option<NaiveDate>,
    /// Date of the last completed donation (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) last_donation: Option<NaiveDate>,
    /// Date of birth, enables the registration check (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) birth_date: Option<NaiveDate>,
    /// Declared weight in kilograms
    #[arg(long)]
    pub(crate) weight: Option<f64>,
    /// Evaluation date (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Scenario date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) fn run_compatibility(args: CompatibilityArgs) -> Result<(), AppError> {
    match args.blood_type {
        Some(blood_type) => {
            println!("Blood type {} (Rh {:?})", blood_type, blood_type.rh_factor());
            println!("- can receive from: {}", join(&compatible_donor_types(blood_type)));
            println!("- can give to: {}", join(&compatible_recipient_types(blood_type)));
        }
        None => println!("{}", render_table()),
    }
    Ok(())
}

/// Donor rows by recipient columns, `x` marking a permitted transfusion.
fn render_table() -> String {
    let mut out = String::from("donor\\recipient");
    for recipient in BloodType::ALL {
        out.push_str(&format!(" {:>4}", recipient.label()));
    }
    for donor in BloodType::ALL {
        out.push_str(&format!("\n{:<15}", donor.label()));
        for recipient in BloodType::ALL {
            let mark = if compatible(donor, recipient) { "x" } else { "." };
            out.push_str(&format!(" {mark:>4}"));
        }
    }
    out
}

fn join(types: &[BloodType]) -> String {
    types
        .iter()
        .map(|blood_type| blood_type.label())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn run_eligibility(args: EligibilityArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let policy = EligibilityPolicy::new(config.eligibility);
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());

    let mut profile = MedicalProfile::new(AccountId("cli".to_string()), args.blood_type);
    profile.medically_fit = args.fit;
    profile.fitness_expires_on = args.fitness_expires;
    profile.last_donation_on = args.last_donation;
    profile.weight_kg = args.weight;

    let decision = policy.can_donate(&profile, today);
    println!(
        "Eligibility on {today}: {}",
        if decision.eligible { "eligible" } else { "not eligible" }
    );
    println!("- {}", decision.summary());
    if decision.days_until_eligible > 0 {
        println!("- days until eligible: {}", decision.days_until_eligible);
    }

    if let Some(birth_date) = args.birth_date {
        match policy.registration_check(UserRole::Donante, birth_date, args.weight, today) {
            Ok(()) => println!("- registration as donor: accepted"),
            Err(rejection) => println!("- registration as donor: rejected ({rejection})"),
        }
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let repository = Arc::new(InMemoryDonationRepository::default());
    let notifier = Arc::new(LoggingNotifier::default());
    let service = DonationService::new(
        repository.clone(),
        notifier.clone(),
        EligibilityConfig::default(),
    );

    println!("Red Roja donation demo ({today})");
    for profile in demo_donors(today) {
        println!(
            "- registered donor {} ({}, {} donations)",
            profile.donor_id.0, profile.blood_type, profile.total_donations
        );
        repository
            .register_profile(profile)
            .map_err(|err| AppError::Donation(err.into()))?;
    }

    let request = service.create_request(
        AccountId("usr-receptor".to_string()),
        RequestDraft {
            required_type: BloodType::AbPositive,
            units_required: 2,
            priority: RequestPriority::Urgente,
            needed_on: today + Duration::days(2),
            public: true,
            hospital: Some("Hospital Italiano".to_string()),
            reason: Some("Cirugía cardiovascular".to_string()),
        },
        today,
    )?;
    println!(
        "\nUrgent request {} for {} opened -> {}",
        request.id.0,
        request.required_type,
        request.status.label()
    );

    let donors = service.compatible_donors(&request.id, today)?;
    let names: Vec<&str> = donors.iter().map(|id| id.0.as_str()).collect();
    println!("  Eligible compatible donors: {}", names.join(", "));

    let response =
        service.respond_to_request(&request.id, &AccountId("usr-o-neg".to_string()), today)?;
    println!(
        "  usr-o-neg responded -> donation {} {} on {}, request {}",
        response.donation.id.0,
        response.donation.status.label(),
        response.donation.scheduled_on,
        response
            .request
            .as_ref()
            .map(|request| request.status.label())
            .unwrap_or("-")
    );

    match service.respond_to_request(&request.id, &AccountId("usr-ab-pos".to_string()), today) {
        Ok(_) => println!("  usr-ab-pos responded as well (unexpected)"),
        Err(err) => println!("  usr-ab-pos rejected: {err}"),
    }

    let completed = service.complete_donation(&response.donation.id)?;
    println!(
        "  Donation {} -> {}, request {}",
        completed.donation.id.0,
        completed.donation.status.label(),
        completed
            .request
            .as_ref()
            .map(|request| request.status.label())
            .unwrap_or("-")
    );
    if let Some(profile) = &completed.profile {
        println!(
            "  usr-o-neg now has {} donation(s), last on {}",
            profile.total_donations,
            profile
                .last_donation_on
                .map(|date| date.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    let next_day = completed.donation.scheduled_on + Duration::days(1);
    let decision = service.eligibility(&AccountId("usr-o-neg".to_string()), next_day)?;
    println!("  Eligibility on {next_day}: {}", decision.summary());

    let delivered = notifier.delivered();
    println!("\nNotifications ({}):", delivered.len());
    for notification in delivered {
        println!(
            "- {:?} -> {}",
            notification.kind, notification.recipient.0
        );
    }

    Ok(())
}

fn demo_donors(today: NaiveDate) -> Vec<MedicalProfile> {
    let fit = |id: &str, blood_type| {
        let mut profile = MedicalProfile::new(AccountId(id.to_string()), blood_type);
        profile.weight_kg = Some(72.0);
        profile.medically_fit = true;
        profile.fitness_expires_on = Some(today + Duration::days(180));
        profile
    };

    let mut resting = fit("usr-a-pos", BloodType::APositive);
    resting.last_donation_on = Some(today - Duration::days(30));
    resting.total_donations = 4;

    let mut unfit = fit("usr-b-neg", BloodType::BNegative);
    unfit.medically_fit = false;

    vec![
        fit("usr-o-neg", BloodType::ONegative),
        resting,
        unfit,
        fit("usr-ab-pos", BloodType::AbPositive),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_marks_twenty_seven_pairs() {
        let table = render_table();
        assert_eq!(table.lines().count(), 9);
        assert_eq!(table.matches(" x").count(), 27);
        let o_negative_row = table
            .lines()
            .find(|line| line.starts_with("O-"))
            .expect("O- row");
        assert_eq!(o_negative_row.matches('x').count(), 8);
    }

    #[test]
    fn demo_runs_end_to_end() {
        run_demo(DemoArgs {
            today: NaiveDate::from_ymd_opt(2025, 3, 10),
        })
        .expect("demo completes");
    }
}
