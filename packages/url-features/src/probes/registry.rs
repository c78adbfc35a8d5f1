//! Domain registration lookups.
//!
//! [`RegistryResolver`] walks an ordered chain of [`RegistryBackend`]s until
//! one returns a usable [`RegistrationRecord`]. Two backends ship with the
//! crate:
//!
//! - [`RdapBackend`]: structured JSON over HTTP
//! - [`WhoisBackend`]: port-43 text, following the IANA referral
//!
//! Nothing is cached; every lookup goes to the network.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use super::LookupOutcome;
use crate::error::{ConfigError, RegistryError, RegistryResult};
use crate::hostname::strip_www;
use crate::types::config::RegistryConfig;
use crate::types::registration::RegistrationRecord;

/// Second-level labels under which registrations happen one level deeper
/// (`example.co.uk`).
const CCSLD_LABELS: &[&str] = &["ac", "co", "com", "edu", "go", "gov", "ne", "net", "or", "org"];

/// The part of `host` a registry knows about.
///
/// `None` for IP literals and empty hosts.
pub fn registrable_domain(host: &str) -> Option<String> {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.is_empty() || bare.parse::<IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = bare.split('.').filter(|l| !l.is_empty()).collect();
    let keep = match labels.as_slice() {
        [.., second, tld] if labels.len() >= 3 && tld.len() == 2 && CCSLD_LABELS.contains(second) => 3,
        _ => 2,
    };

    let start = labels.len().saturating_sub(keep);
    Some(labels[start..].join("."))
}

/// Parse the date formats registries commonly emit.
pub fn parse_registry_date(raw: &str) -> Option<DateTime<Utc>> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%d-%b-%Y %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d-%b-%Y", "%d.%m.%Y"];

    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    // Registries append zone names or remarks after the date itself.
    let candidates = [raw, raw.split_whitespace().next().unwrap_or(raw)];
    for candidate in candidates {
        for format in DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(candidate, format) {
                return Some(naive.and_utc());
            }
        }
        for format in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(candidate, format) {
                return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
            }
        }
    }

    None
}

/// One way of obtaining a registration record.
#[async_trait]
pub trait RegistryBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Look up the registration covering `host`.
    async fn lookup(&self, host: &str) -> LookupOutcome<RegistrationRecord>;
}

/// RDAP lookups against `<base>/domain/<domain>`.
pub struct RdapBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapDomain {
    ldh_name: Option<String>,
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RdapEvent {
    event_action: String,
    event_date: String,
}

impl RdapBackend {
    pub fn new(config: &RegistryConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, &config.rdap_base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn query(&self, domain: &str) -> RegistryResult<RegistrationRecord> {
        let response = self
            .client
            .get(format!("{}/domain/{}", self.base_url, domain))
            .header(reqwest::header::ACCEPT, "application/rdap+json, application/json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound {
                domain: domain.to_string(),
            });
        }
        if !response.status().is_success() {
            return Err(RegistryError::Malformed(format!(
                "RDAP status {}",
                response.status()
            )));
        }

        let body: RdapDomain = response.json().await?;
        Ok(rdap_record(body))
    }
}

fn rdap_record(body: RdapDomain) -> RegistrationRecord {
    let event_date = |action: &str| {
        body.events
            .iter()
            .filter(|e| e.event_action.eq_ignore_ascii_case(action))
            .find_map(|e| parse_registry_date(&e.event_date))
    };

    let mut record = RegistrationRecord::new();
    if let Some(name) = body.ldh_name.as_deref().filter(|n| !n.is_empty()) {
        record = record.with_name(name);
    }
    if let Some(created) = event_date("registration") {
        record = record.with_creation_date(created);
    }
    if let Some(expires) = event_date("expiration") {
        record = record.with_expiration_date(expires);
    }
    record
}

#[async_trait]
impl RegistryBackend for RdapBackend {
    fn name(&self) -> &'static str {
        "rdap"
    }

    async fn lookup(&self, host: &str) -> LookupOutcome<RegistrationRecord> {
        let Some(domain) = registrable_domain(host) else {
            return LookupOutcome::NotApplicable;
        };
        LookupOutcome::from_result(self.query(&domain).await)
    }
}

/// Port-43 WHOIS, asking the referral server which registry to query.
pub struct WhoisBackend {
    referral_server: String,
    timeout: Duration,
}

impl WhoisBackend {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            referral_server: config.whois_referral_server.clone(),
            timeout: config.timeout,
        }
    }

    async fn query(&self, server: &str, domain: &str) -> RegistryResult<String> {
        let exchange = async {
            let mut stream = TcpStream::connect(server).await?;
            stream.write_all(format!("{}\r\n", domain).as_bytes()).await?;
            let mut response = Vec::new();
            stream.read_to_end(&mut response).await?;
            Ok::<_, RegistryError>(String::from_utf8_lossy(&response).into_owned())
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RegistryError::Timeout)?
    }

    async fn lookup_domain(&self, domain: &str) -> RegistryResult<RegistrationRecord> {
        let referral = self.query(&self.referral_server, domain).await?;
        let fields = parse_whois_fields(&referral);

        let server = fields
            .get("refer")
            .or_else(|| fields.get("whois"))
            .and_then(|values| values.first())
            .map(|server| with_whois_port(server))
            .ok_or_else(|| RegistryError::Malformed(format!("no referral for {}", domain)))?;

        debug!(domain = %domain, server = %server, "querying WHOIS registry");
        let reply = self.query(&server, domain).await?;
        let fields = parse_whois_fields(&reply);

        if fields.is_empty() && looks_unregistered(&reply) {
            return Err(RegistryError::NotFound {
                domain: domain.to_string(),
            });
        }

        Ok(RegistrationRecord::from_fields(&fields, parse_registry_date))
    }
}

fn with_whois_port(server: &str) -> String {
    if server.contains(':') {
        server.to_string()
    } else {
        format!("{}:43", server)
    }
}

fn looks_unregistered(reply: &str) -> bool {
    let lower = reply.to_lowercase();
    ["no match", "not found", "no entries found", "no data found"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Canonical key for a WHOIS field name, folding registry-specific aliases.
fn canonical_key(raw: &str) -> String {
    let key: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    let canonical = match key.as_str() {
        "domain" | "domain_name" => "domain_name",
        "creation_date" | "created" | "created_on" | "registered" | "registered_on"
        | "registration_time" | "domain_registration_date" => "creation_date",
        "registry_expiry_date"
        | "expiration_date"
        | "expiry_date"
        | "expires"
        | "expires_on"
        | "expire_date"
        | "paid_till"
        | "registrar_registration_expiration_date"
        | "domain_expiration_date" => "expiration_date",
        other => other,
    };
    canonical.to_string()
}

/// Parse `key: value` lines into a key -> values dictionary.
///
/// Comment lines (`%`, `#`, `>>>`) and blank values are skipped. Values keep
/// their source order, so the first occurrence of a repeated key comes first.
pub fn parse_whois_fields(reply: &str) -> HashMap<String, Vec<String>> {
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();

    for line in reply.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') || line.starts_with('#') || line.starts_with(">>>") {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        fields
            .entry(canonical_key(key))
            .or_default()
            .push(value.to_string());
    }

    fields
}

#[async_trait]
impl RegistryBackend for WhoisBackend {
    fn name(&self) -> &'static str {
        "whois"
    }

    async fn lookup(&self, host: &str) -> LookupOutcome<RegistrationRecord> {
        let Some(domain) = registrable_domain(host) else {
            return LookupOutcome::NotApplicable;
        };
        LookupOutcome::from_result(self.lookup_domain(&domain).await)
    }
}

/// Ordered chain of registry backends.
#[derive(Clone)]
pub struct RegistryResolver {
    backends: Vec<Arc<dyn RegistryBackend>>,
    timeout: Duration,
}

impl RegistryResolver {
    pub fn new(backends: Vec<Arc<dyn RegistryBackend>>, timeout: Duration) -> Self {
        Self { backends, timeout }
    }

    /// RDAP first, then WHOIS.
    pub fn from_config(config: &RegistryConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            vec![
                Arc::new(RdapBackend::new(config)?),
                Arc::new(WhoisBackend::new(config)),
            ],
            config.timeout,
        ))
    }

    /// Registration record for `host`, or `None` when every backend missed.
    ///
    /// A full miss is retried once with a leading `www.` removed.
    pub async fn lookup(&self, host: &str) -> Option<RegistrationRecord> {
        if let Some(record) = self.lookup_chain(host).await {
            return Some(record);
        }

        let stripped = strip_www(host);
        if stripped != host && !stripped.is_empty() {
            debug!(host = %host, "retrying registry lookup without www");
            return self.lookup_chain(stripped).await;
        }

        None
    }

    async fn lookup_chain(&self, host: &str) -> Option<RegistrationRecord> {
        for backend in &self.backends {
            let outcome = tokio::time::timeout(self.timeout, backend.lookup(host))
                .await
                .unwrap_or_else(|_| LookupOutcome::Failed("timed out".to_string()));

            match outcome {
                LookupOutcome::Found(record) if !record.is_empty() => {
                    debug!(host = %host, backend = backend.name(), "registration record found");
                    return Some(record);
                }
                LookupOutcome::Found(_) => {
                    debug!(host = %host, backend = backend.name(), "empty registration record");
                }
                LookupOutcome::NotApplicable => {
                    debug!(host = %host, backend = backend.name(), "backend not applicable");
                }
                LookupOutcome::Failed(reason) => {
                    warn!(host = %host, backend = backend.name(), reason = %reason, "registry backend failed");
                }
            }
        }
        None
    }
}
