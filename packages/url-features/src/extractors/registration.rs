//! Registration-derived extractors (F8, F16, F18).
//!
//! All take an explicit `now` so results are reproducible.

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::types::feature::Signal;
use crate::types::registration::RegistrationRecord;

/// F8: more than a year between now and expiry.
pub fn registration_length(record: &RegistrationRecord, now: DateTime<Utc>) -> Signal {
    match record.expiration_date {
        Some(expiration) => {
            let days = (expiration - now).num_days().abs();
            if days > 365 {
                Signal::Benign
            } else {
                Signal::Suspicious
            }
        }
        None => Signal::Neutral,
    }
}

/// F16: the registered name, read as a pattern, occurs in the URL.
pub fn abnormal_url(record: &RegistrationRecord, url: &str) -> Signal {
    let Some(name) = record.name.as_deref() else {
        return Signal::Neutral;
    };

    match Regex::new(name) {
        Ok(pattern) if pattern.is_match(url) => Signal::Benign,
        Ok(_) => Signal::Suspicious,
        Err(e) => {
            tracing::debug!(name = %name, error = %e, "registered name is not a valid pattern");
            Signal::Neutral
        }
    }
}

/// F18: registered at least 180 days ago.
pub fn age_of_domain(record: &RegistrationRecord, now: DateTime<Utc>) -> Signal {
    match record.creation_date {
        Some(creation) => {
            let days = (now - creation).num_days().abs();
            if days >= 180 {
                Signal::Benign
            } else {
                Signal::Suspicious
            }
        }
        None => Signal::Neutral,
    }
}
