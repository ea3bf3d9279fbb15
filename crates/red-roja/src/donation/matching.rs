//! Donor/request matching on top of the compatibility table.
//!
//! The filter is the whole contract: compatible type and a caller-computed eligibility
//! flag. Ordering beyond that is left to the caller (see [`order_by_proximity`]).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::blood_type::{compatible, compatible_donor_types, BloodType};
use super::domain::{AccountId, DonationRequest, RequestStatus};
use super::DonationRuleViolation;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 coordinates as stored on accounts (`latitud`, `longitud`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "latitud")]
    pub latitude: f64,
    #[serde(rename = "longitud")]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance using the haversine formula.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// One row of the candidate list handed to the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonorCandidate {
    pub donor_id: AccountId,
    pub blood_type: BloodType,
    pub eligible: bool,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

impl DonorCandidate {
    pub fn new(donor_id: AccountId, blood_type: BloodType, eligible: bool) -> Self {
        Self {
            donor_id,
            blood_type,
            eligible,
            location: None,
        }
    }

    /// Build a candidate from an untyped store row; unknown types are rejected.
    pub fn from_row(
        donor_id: AccountId,
        raw_blood_type: &str,
        eligible: bool,
    ) -> Result<Self, DonationRuleViolation> {
        let blood_type = raw_blood_type.parse()?;
        Ok(Self::new(donor_id, blood_type, eligible))
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }
}

/// Eligible candidates whose type may give to `required`, in input order.
pub fn compatible_donors(required: BloodType, donors: &[DonorCandidate]) -> Vec<AccountId> {
    let accepted = compatible_donor_types(required);
    donors
        .iter()
        .filter(|candidate| candidate.eligible && accepted.contains(&candidate.blood_type))
        .map(|candidate| candidate.donor_id.clone())
        .collect()
}

/// [`compatible_donors`] for an untyped required type coming from a caller or store row.
pub fn compatible_donors_for_label(
    required: &str,
    donors: &[DonorCandidate],
) -> Result<Vec<AccountId>, DonationRuleViolation> {
    let required: BloodType = required.parse()?;
    Ok(compatible_donors(required, donors))
}

/// Public, pending requests the donor's type can serve: most urgent first, then soonest.
pub fn requests_for_donor(
    donor_type: BloodType,
    requests: &[DonationRequest],
) -> Vec<DonationRequest> {
    let mut open: Vec<DonationRequest> = requests
        .iter()
        .filter(|request| {
            request.public
                && request.status == RequestStatus::Pendiente
                && compatible(donor_type, request.required_type)
        })
        .cloned()
        .collect();

    open.sort_by(|left, right| {
        right
            .priority
            .cmp(&left.priority)
            .then_with(|| left.needed_on.cmp(&right.needed_on))
    });
    open
}

/// Stable sort by distance from `origin`; candidates without a location go last.
pub fn order_by_proximity(origin: &GeoPoint, candidates: &mut [DonorCandidate]) {
    candidates.sort_by(|left, right| match (&left.location, &right.location) {
        (Some(a), Some(b)) => origin
            .distance_km(a)
            .partial_cmp(&origin.distance_km(b))
            .unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}
