use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::DonationRuleViolation;

/// The closed set of ABO/Rh blood types. Deserialization goes through `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

/// Rh factor as recorded on the medical profile (`factor_rh`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RhFactor {
    Positivo,
    Negativo,
}

const TYPE_COUNT: usize = 8;

// Rows are donors, columns are recipients, both in `BloodType::ALL` order:
//                                 A+     A-     B+     B-     AB+    AB-    O+     O-
const DONOR_TO_RECIPIENT: [[bool; TYPE_COUNT]; TYPE_COUNT] = [
    /* A+  */ [true, false, false, false, true, false, false, false],
    /* A-  */ [true, true, false, false, true, true, false, false],
    /* B+  */ [false, false, true, false, true, false, false, false],
    /* B-  */ [false, false, true, true, true, true, false, false],
    /* AB+ */ [false, false, false, false, true, false, false, false],
    /* AB- */ [false, false, false, false, true, true, false, false],
    /* O+  */ [true, false, true, false, true, false, true, false],
    /* O-  */ [true, true, true, true, true, true, true, true],
];

const RECIPIENT_FROM_DONOR: [[bool; TYPE_COUNT]; TYPE_COUNT] = transpose(&DONOR_TO_RECIPIENT);

const fn transpose(table: &[[bool; TYPE_COUNT]; TYPE_COUNT]) -> [[bool; TYPE_COUNT]; TYPE_COUNT] {
    let mut out = [[false; TYPE_COUNT]; TYPE_COUNT];
    let mut row = 0;
    while row < TYPE_COUNT {
        let mut col = 0;
        while col < TYPE_COUNT {
            out[col][row] = table[row][col];
            col += 1;
        }
        row += 1;
    }
    out
}

impl BloodType {
    pub const ALL: [BloodType; TYPE_COUNT] = [
        BloodType::APositive,
        BloodType::ANegative,
        BloodType::BPositive,
        BloodType::BNegative,
        BloodType::AbPositive,
        BloodType::AbNegative,
        BloodType::OPositive,
        BloodType::ONegative,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            BloodType::APositive => "A+",
            BloodType::ANegative => "A-",
            BloodType::BPositive => "B+",
            BloodType::BNegative => "B-",
            BloodType::AbPositive => "AB+",
            BloodType::AbNegative => "AB-",
            BloodType::OPositive => "O+",
            BloodType::ONegative => "O-",
        }
    }

    pub const fn rh_factor(self) -> RhFactor {
        match self {
            BloodType::APositive
            | BloodType::BPositive
            | BloodType::AbPositive
            | BloodType::OPositive => RhFactor::Positivo,
            BloodType::ANegative
            | BloodType::BNegative
            | BloodType::AbNegative
            | BloodType::ONegative => RhFactor::Negativo,
        }
    }

    const fn index(self) -> usize {
        match self {
            BloodType::APositive => 0,
            BloodType::ANegative => 1,
            BloodType::BPositive => 2,
            BloodType::BNegative => 3,
            BloodType::AbPositive => 4,
            BloodType::AbNegative => 5,
            BloodType::OPositive => 6,
            BloodType::ONegative => 7,
        }
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BloodType {
    type Err = DonationRuleViolation;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        BloodType::ALL
            .into_iter()
            .find(|candidate| candidate.label() == normalized)
            .ok_or_else(|| DonationRuleViolation::UnknownBloodType(raw.to_string()))
    }
}

impl<'de> Deserialize<'de> for BloodType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Table lookup: may `donor` give to `recipient`?
pub fn compatible(donor: BloodType, recipient: BloodType) -> bool {
    DONOR_TO_RECIPIENT[donor.index()][recipient.index()]
}

/// Donor types a recipient may receive from, in `BloodType::ALL` order.
pub fn compatible_donor_types(recipient: BloodType) -> Vec<BloodType> {
    let row = &RECIPIENT_FROM_DONOR[recipient.index()];
    BloodType::ALL
        .into_iter()
        .filter(|donor| row[donor.index()])
        .collect()
}

/// Recipient types a donor may give to, in `BloodType::ALL` order.
pub fn compatible_recipient_types(donor: BloodType) -> Vec<BloodType> {
    let row = &DONOR_TO_RECIPIENT[donor.index()];
    BloodType::ALL
        .into_iter()
        .filter(|recipient| row[recipient.index()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use BloodType::*;

    // Donor -> recipients as published by blood banks, written out independently of the table.
    fn canonical_recipients(donor: BloodType) -> &'static [BloodType] {
        match donor {
            ONegative => &[
                ONegative, OPositive, ANegative, APositive, BNegative, BPositive, AbNegative,
                AbPositive,
            ],
            OPositive => &[OPositive, APositive, BPositive, AbPositive],
            ANegative => &[ANegative, APositive, AbNegative, AbPositive],
            APositive => &[APositive, AbPositive],
            BNegative => &[BNegative, BPositive, AbNegative, AbPositive],
            BPositive => &[BPositive, AbPositive],
            AbNegative => &[AbNegative, AbPositive],
            AbPositive => &[AbPositive],
        }
    }

    fn abo_antigens(blood_type: BloodType) -> (bool, bool) {
        match blood_type {
            APositive | ANegative => (true, false),
            BPositive | BNegative => (false, true),
            AbPositive | AbNegative => (true, true),
            OPositive | ONegative => (false, false),
        }
    }

    #[test]
    fn table_matches_canonical_chart_for_all_64_pairs() {
        let mut checked = 0;
        for donor in BloodType::ALL {
            for recipient in BloodType::ALL {
                let expected = canonical_recipients(donor).contains(&recipient);
                assert_eq!(
                    compatible(donor, recipient),
                    expected,
                    "compatible({donor}, {recipient})"
                );
                checked += 1;
            }
        }
        assert_eq!(checked, 64);
    }

    #[test]
    fn table_agrees_with_antigen_rules() {
        for donor in BloodType::ALL {
            for recipient in BloodType::ALL {
                let (donor_a, donor_b) = abo_antigens(donor);
                let (recipient_a, recipient_b) = abo_antigens(recipient);
                let abo_ok = (!donor_a || recipient_a) && (!donor_b || recipient_b);
                let rh_ok = donor.rh_factor() == RhFactor::Negativo
                    || recipient.rh_factor() == RhFactor::Positivo;
                assert_eq!(compatible(donor, recipient), abo_ok && rh_ok);
            }
        }
    }

    #[test]
    fn documented_examples() {
        assert!(compatible(ONegative, AbPositive));
        assert!(!compatible(APositive, OPositive));
        assert!(compatible(AbPositive, AbPositive));
        assert!(!compatible(AbPositive, ONegative));
    }

    #[test]
    fn universal_donor_and_recipient() {
        assert_eq!(compatible_recipient_types(ONegative), BloodType::ALL.to_vec());
        assert_eq!(compatible_donor_types(AbPositive), BloodType::ALL.to_vec());
        assert_eq!(compatible_donor_types(ONegative), vec![ONegative]);
    }

    #[test]
    fn inverse_projection_matches_brute_force_scan() {
        for recipient in BloodType::ALL {
            let scanned: Vec<BloodType> = BloodType::ALL
                .into_iter()
                .filter(|donor| compatible(*donor, recipient))
                .collect();
            assert_eq!(compatible_donor_types(recipient), scanned, "recipient {recipient}");
        }
    }

    #[test]
    fn parses_labels_and_rejects_unknown_values() {
        assert_eq!("ab+".parse::<BloodType>().expect("parses"), AbPositive);
        assert_eq!(" O- ".parse::<BloodType>().expect("parses"), ONegative);
        for blood_type in BloodType::ALL {
            assert_eq!(blood_type.label().parse::<BloodType>().expect("label"), blood_type);
        }

        match "C+".parse::<BloodType>() {
            Err(DonationRuleViolation::UnknownBloodType(raw)) => assert_eq!(raw, "C+"),
            other => panic!("expected unknown blood type, got {other:?}"),
        }
        assert!("A".parse::<BloodType>().is_err());
    }

    #[test]
    fn serializes_with_store_labels() {
        let json = serde_json::to_string(&AbNegative).expect("serializes");
        assert_eq!(json, "\"AB-\"");
        let parsed: BloodType = serde_json::from_str("\"O+\"").expect("deserializes");
        assert_eq!(parsed, OPositive);
        let lenient: BloodType = serde_json::from_str("\" ab+ \"").expect("matches FromStr");
        assert_eq!(lenient, AbPositive);
        assert!(serde_json::from_str::<BloodType>("\"Z+\"").is_err());
    }
}
