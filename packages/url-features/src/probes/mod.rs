//! Network probes: DNS, registration records, search presence, reputation.
//!
//! Registry and search lookups are ordered chains of backends. Each backend
//! reports a [`LookupOutcome`]; the chain moves on until one finds something.

pub mod dns;
pub mod registry;
pub mod reputation;
pub mod search;

pub use dns::{DnsProber, DnsResolver, SystemResolver};
pub use registry::{RdapBackend, RegistryBackend, RegistryResolver, WhoisBackend};
pub use reputation::{web_traffic, ReputationProbe};
pub use search::{HtmlSearchBackend, SearchBackend, SearchIndexProbe, TavilySearchBackend};

/// Result of asking one backend in a chain.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome<T> {
    /// The backend cannot answer this kind of query
    NotApplicable,
    /// The backend tried and failed
    Failed(String),
    /// The backend answered
    Found(T),
}

impl<T> LookupOutcome<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupOutcome::Found(_))
    }

    pub fn found(self) -> Option<T> {
        match self {
            LookupOutcome::Found(value) => Some(value),
            _ => None,
        }
    }

    /// Convert an error-returning call into an outcome.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => LookupOutcome::Found(value),
            Err(e) => LookupOutcome::Failed(e.to_string()),
        }
    }
}
