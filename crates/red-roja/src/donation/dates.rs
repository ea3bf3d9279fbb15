//! Calendar-date helpers shared by the eligibility policy and the HTTP boundary.
//!
//! Dates arrive from the store as `YYYY-MM-DD` (sometimes with a `T...` time suffix).
//! They are split into components and rebuilt as calendar dates so cooldown and age
//! arithmetic never depends on the server's timezone.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer};

/// Reasons a boundary date string could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateParseError {
    #[error("'{0}' is not in YYYY-MM-DD form")]
    Malformed(String),
    #[error("'{0}' is not a valid calendar date")]
    OutOfRange(String),
}

/// Parse `YYYY-MM-DD` (optionally followed by `T...`) into a calendar date.
pub fn parse_calendar_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = raw.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);

    let mut parts = date_part.split('-');
    let (Some(year), Some(month), Some(day), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DateParseError::Malformed(raw.to_string()));
    };

    let year: i32 = year
        .parse()
        .map_err(|_| DateParseError::Malformed(raw.to_string()))?;
    let month: u32 = month
        .parse()
        .map_err(|_| DateParseError::Malformed(raw.to_string()))?;
    let day: u32 = day
        .parse()
        .map_err(|_| DateParseError::Malformed(raw.to_string()))?;

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DateParseError::OutOfRange(raw.to_string()))
}

/// Whole calendar days from `from` to `to` (negative when `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// Completed years of age on `today`, decremented when this year's birthday is still ahead.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Serde adapter for `YYYY-MM-DD` fields using [`parse_calendar_date`].
pub fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).map_err(serde::de::Error::custom)
}

/// Serde adapter for optional `YYYY-MM-DD` fields using [`parse_calendar_date`].
pub fn deserialize_optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|value| parse_calendar_date(&value).map_err(serde::de::Error::custom))
        .transpose()
}
