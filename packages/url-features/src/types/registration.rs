//! Normalized domain registration record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registration metadata for a domain, normalized across backends.
///
/// Created per lookup and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Registered domain name, lowercased.
    pub name: Option<String>,

    pub creation_date: Option<DateTime<Utc>>,

    pub expiration_date: Option<DateTime<Utc>>,
}

impl RegistrationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into().to_lowercase());
        self
    }

    pub fn with_creation_date(mut self, date: DateTime<Utc>) -> Self {
        self.creation_date = Some(date);
        self
    }

    pub fn with_expiration_date(mut self, date: DateTime<Utc>) -> Self {
        self.expiration_date = Some(date);
        self
    }

    /// A record carrying nothing usable counts as a miss.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.creation_date.is_none() && self.expiration_date.is_none()
    }

    /// Build a record from a dictionary-shaped reply.
    ///
    /// Reads `domain_name`, `creation_date` and `expiration_date`. Each key may
    /// carry several values; the first parseable one wins.
    pub fn from_fields(
        fields: &HashMap<String, Vec<String>>,
        parse_date: impl Fn(&str) -> Option<DateTime<Utc>>,
    ) -> Self {
        let first_date = |key: &str| {
            fields
                .get(key)
                .and_then(|values| values.iter().find_map(|v| parse_date(v)))
        };

        Self {
            name: fields
                .get("domain_name")
                .and_then(|values| values.first())
                .map(|v| v.trim().to_lowercase())
                .filter(|v| !v.is_empty()),
            creation_date: first_date("creation_date"),
            expiration_date: first_date("expiration_date"),
        }
    }
}
