//! Per-URL extraction with stage gating and neutral substitution.
//!
//! Stages run in a fixed order:
//!
//! 1. lexical features (F1-F7, F10) from the URL string
//! 2. DNS, then the registry lookup when the host resolves
//! 3. page fetch, only when the host resolves
//! 4. document features (F9, F11-F15, F17), substituted when no page
//! 5. registration features (F8, F16, F18) and the DNS flag (F19)
//! 6. popularity, search presence and reputation (F20-F22)
//!
//! Every group is isolated: a panic inside one is logged and leaves that
//! group's slots at 0. [`FeatureExtractor::extract`] itself never fails.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::ConfigError;
use crate::extractors::{document, lexical, registration};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::hostname::{hostname_from_url, with_default_scheme};
use crate::pacing::{pacer_for, NoPacer, Pacer};
use crate::probes::dns::{DnsProber, DnsResolver, SystemResolver};
use crate::probes::registry::{RegistryBackend, RegistryResolver};
use crate::probes::reputation::{web_traffic, ReputationProbe};
use crate::probes::search::{SearchBackend, SearchIndexProbe};
use crate::types::config::{ExtractorConfig, PopularityPolicy};
use crate::types::document::FetchedDocument;
use crate::types::feature::{Feature, FeatureVector, Signal};
use crate::types::registration::RegistrationRecord;

/// Supplies "now" for registration-derived features.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What the DNS and registry stages established about a host.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationState {
    /// The host does not resolve
    Unresolvable,
    /// The host resolves but no backend had a record
    NoRecord,
    /// The host resolves and has a record
    Record(RegistrationRecord),
    /// The stage itself faulted; nothing is known
    Faulted,
}

impl RegistrationState {
    /// Whether the page fetch should run.
    pub fn resolved(&self) -> bool {
        matches!(self, RegistrationState::NoRecord | RegistrationState::Record(_))
    }

    /// F19
    pub fn dns_signal(&self) -> Signal {
        match self {
            RegistrationState::Unresolvable => Signal::Suspicious,
            RegistrationState::Record(_) => Signal::Benign,
            RegistrationState::NoRecord | RegistrationState::Faulted => Signal::Neutral,
        }
    }
}

/// Turns one URL into a [`FeatureVector`].
///
/// Cheap to share behind an `Arc`; holds no per-URL state.
///
/// # Example
///
/// ```rust,ignore
/// let extractor = FeatureExtractor::from_config(&ExtractorConfig::default())?;
/// let features = extractor.extract("https://example.com/login").await;
/// println!("{:?}", features.values());
/// ```
pub struct FeatureExtractor {
    dns: DnsProber,
    registry: RegistryResolver,
    fetcher: Arc<dyn Fetcher>,
    search: SearchIndexProbe,
    reputation: ReputationProbe,
    popularity: PopularityPolicy,
    clock: Clock,
}

impl FeatureExtractor {
    pub fn builder(config: ExtractorConfig) -> FeatureExtractorBuilder {
        FeatureExtractorBuilder::new(config)
    }

    /// Live network stack paced per `config.pacing`.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        Self::builder(config.clone())
            .pacer(pacer_for(&config.pacing))
            .build()
    }

    /// Extract all 22 features. Never fails; unavailable stages contribute
    /// their substitution values.
    pub async fn extract(&self, url: &str) -> FeatureVector {
        let hostname = hostname_from_url(url);
        let mut features = FeatureVector::neutral();

        if let Some(values) = guard("lexical", url, || lexical_features(url, &hostname)) {
            features.set_all(&values);
        }

        let state = guard_async("dns-registry", url, self.probe_registration(&hostname))
            .await
            .unwrap_or(RegistrationState::Faulted);
        debug!(url = %url, hostname = %hostname, state = state_name(&state), "registration stage done");

        let page = if state.resolved() {
            let target = with_default_scheme(url);
            guard_async("fetch", url, self.fetcher.fetch(&target))
                .await
                .flatten()
        } else {
            None
        };
        debug!(url = %url, available = page.is_some(), "document stage input");

        if let Some(values) = guard("document", url, || document_features(page.as_ref(), url, &hostname)) {
            features.set_all(&values);
        }

        let now = (self.clock)();
        if let Some(values) = guard("registration", url, || registration_features(&state, url, now)) {
            features.set_all(&values);
        }
        features.set(Feature::DnsRecord, state.dns_signal());

        if let Some(signal) = guard("web-traffic", url, || web_traffic(&hostname, &self.popularity)) {
            features.set(Feature::WebTraffic, signal);
        }

        if let Some(signal) = guard_async("search-index", url, self.search.probe(&hostname)).await {
            features.set(Feature::SearchIndex, signal);
        }

        if let Some(signal) = guard_async("reputation", url, self.reputation.check(url, &hostname)).await {
            features.set(Feature::ReputationReport, signal);
        }

        features
    }

    async fn probe_registration(&self, hostname: &str) -> RegistrationState {
        if !self.dns.is_resolvable(hostname).await {
            return RegistrationState::Unresolvable;
        }
        match self.registry.lookup(hostname).await {
            Some(record) => RegistrationState::Record(record),
            None => RegistrationState::NoRecord,
        }
    }
}

fn state_name(state: &RegistrationState) -> &'static str {
    match state {
        RegistrationState::Unresolvable => "unresolvable",
        RegistrationState::NoRecord => "no-record",
        RegistrationState::Record(_) => "record",
        RegistrationState::Faulted => "faulted",
    }
}

fn lexical_features(url: &str, hostname: &str) -> [(Feature, Signal); 8] {
    [
        (Feature::IpAddress, lexical::ip_address(url)),
        (Feature::UrlLength, lexical::url_length(url)),
        (Feature::ShorteningService, lexical::shortening_service(url)),
        (Feature::AtSymbol, lexical::at_symbol(url)),
        (Feature::DoubleSlashRedirect, lexical::double_slash_redirect(url)),
        (Feature::PrefixSuffix, lexical::prefix_suffix(hostname)),
        (Feature::SubDomain, lexical::sub_domain(url)),
        (Feature::HttpsToken, document::https_token(url)),
    ]
}

fn document_features(
    page: Option<&FetchedDocument>,
    url: &str,
    hostname: &str,
) -> [(Feature, Signal); 7] {
    let doc = page.map(|p| &p.document);
    [
        (Feature::Favicon, document::favicon(doc, url, hostname)),
        (Feature::RequestUrl, document::request_url(doc, url, hostname)),
        (Feature::AnchorUrl, document::url_of_anchor(doc, url, hostname)),
        (Feature::LinksInTags, document::links_in_tags(doc, url, hostname)),
        (Feature::Sfh, document::server_form_handler(doc, url, hostname)),
        (Feature::SubmitToEmail, document::submitting_to_email(doc)),
        (Feature::Iframe, document::iframe(doc)),
    ]
}

fn registration_features(
    state: &RegistrationState,
    url: &str,
    now: DateTime<Utc>,
) -> [(Feature, Signal); 3] {
    let (length, abnormal, age) = match state {
        RegistrationState::Record(record) => (
            registration::registration_length(record, now),
            registration::abnormal_url(record, url),
            registration::age_of_domain(record, now),
        ),
        RegistrationState::Unresolvable => (Signal::Suspicious, Signal::Suspicious, Signal::Suspicious),
        RegistrationState::NoRecord | RegistrationState::Faulted => {
            (Signal::Neutral, Signal::Neutral, Signal::Neutral)
        }
    };
    [
        (Feature::RegistrationLength, length),
        (Feature::AbnormalUrl, abnormal),
        (Feature::DomainAge, age),
    ]
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn guard<T>(group: &'static str, url: &str, f: impl FnOnce() -> T) -> Option<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(panic) => {
            error!(url = %url, group, panic = %panic_message(panic.as_ref()), "feature group panicked");
            None
        }
    }
}

async fn guard_async<F: Future>(group: &'static str, url: &str, future: F) -> Option<F::Output> {
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => Some(value),
        Err(panic) => {
            error!(url = %url, group, panic = %panic_message(panic.as_ref()), "feature group panicked");
            None
        }
    }
}

/// Builder for [`FeatureExtractor`].
///
/// Components left unset are built from the [`ExtractorConfig`].
pub struct FeatureExtractorBuilder {
    config: ExtractorConfig,
    resolver: Option<Arc<dyn DnsResolver>>,
    registry_backends: Option<Vec<Arc<dyn RegistryBackend>>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    search_backends: Option<Vec<Arc<dyn SearchBackend>>>,
    pacer: Option<Arc<dyn Pacer>>,
    clock: Option<Clock>,
}

impl FeatureExtractorBuilder {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            resolver: None,
            registry_backends: None,
            fetcher: None,
            search_backends: None,
            pacer: None,
            clock: None,
        }
    }

    pub fn resolver(mut self, resolver: Arc<dyn DnsResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn registry_backends(mut self, backends: Vec<Arc<dyn RegistryBackend>>) -> Self {
        self.registry_backends = Some(backends);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn search_backends(mut self, backends: Vec<Arc<dyn SearchBackend>>) -> Self {
        self.search_backends = Some(backends);
        self
    }

    /// Pacer for fetch retries and search probes. Default: none.
    pub fn pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    /// Fix "now" for registration-derived features.
    pub fn clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> Result<FeatureExtractor, ConfigError> {
        let config = self.config;
        let pacer: Arc<dyn Pacer> = self.pacer.unwrap_or_else(|| Arc::new(NoPacer));

        let resolver = self.resolver.unwrap_or_else(|| Arc::new(SystemResolver));
        let dns = DnsProber::new(resolver, config.dns_timeout);

        let registry = match self.registry_backends {
            Some(backends) => RegistryResolver::new(backends, config.registry.timeout),
            None => RegistryResolver::from_config(&config.registry)?,
        };

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(config.fetch.clone())?.with_pacer(pacer.clone())),
        };

        let search = match self.search_backends {
            Some(backends) => SearchIndexProbe::new(backends, config.search.timeout),
            None => SearchIndexProbe::from_config(&config.search)?,
        }
        .with_pacer(pacer);

        Ok(FeatureExtractor {
            reputation: ReputationProbe::new(dns.clone()),
            dns,
            registry,
            fetcher,
            search,
            popularity: config.popularity,
            clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now)),
        })
    }
}
