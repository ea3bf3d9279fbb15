//! Blood-type compatibility, donor eligibility and donation workflow engine.
//!
//! The [`donation`] module holds the pure engine plus the service facade that loads
//! entities through a [`donation::DonationRepository`] and hands notifications to a
//! [`donation::Notifier`]. Configuration, telemetry and the application error type
//! follow the same shape as the HTTP service that embeds this crate.

pub mod config;
pub mod donation;
pub mod error;
pub mod telemetry;
