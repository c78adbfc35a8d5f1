//! Testing utilities including mock implementations.
//!
//! These are useful for testing applications that use the extraction library
//! without making real DNS, registry, HTTP or search calls. All mocks are
//! cheap to clone and share their state, so a test can keep a handle for
//! assertions after moving a clone into the extractor.

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use url::Url;

use crate::classifier::Classifier;
use crate::fetch::Fetcher;
use crate::pacing::{Pacer, PauseKind};
use crate::probes::dns::DnsResolver;
use crate::probes::registry::RegistryBackend;
use crate::probes::search::{SearchBackend, SearchHit};
use crate::probes::LookupOutcome;
use crate::types::document::FetchedDocument;
use crate::types::feature::FeatureVector;
use crate::types::registration::RegistrationRecord;

/// A mock DNS resolver with a fixed host table.
#[derive(Clone, Default)]
pub struct MockResolver {
    /// Addresses by host
    hosts: Arc<RwLock<HashMap<String, Vec<IpAddr>>>>,

    /// Artificial latency per lookup
    delay: Option<Duration>,

    /// Panic instead of answering
    panics: bool,

    /// Call tracking
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address for `host`. Unparseable addresses are ignored.
    pub fn with_host(self, host: impl Into<String>, ip: &str) -> Self {
        if let Ok(ip) = ip.parse() {
            self.hosts
                .write()
                .unwrap()
                .entry(host.into())
                .or_default()
                .push(ip);
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    /// Hosts looked up, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl DnsResolver for MockResolver {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        self.calls.write().unwrap().push(host.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("mock resolver panicked on {}", host);
        }

        let addrs = self.hosts.read().unwrap().get(host).cloned();
        addrs.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("unknown host {}", host))
        })
    }
}

/// A mock registry backend with predefined records.
///
/// Unknown hosts report not-applicable, or failure when built with
/// [`failing`](Self::failing).
#[derive(Clone, Default)]
pub struct MockRegistryBackend {
    records: Arc<RwLock<HashMap<String, RegistrationRecord>>>,
    failing: bool,
    delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockRegistryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, host: impl Into<String>, record: RegistrationRecord) -> Self {
        self.records.write().unwrap().insert(host.into(), record);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl RegistryBackend for MockRegistryBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn lookup(&self, host: &str) -> LookupOutcome<RegistrationRecord> {
        self.calls.write().unwrap().push(host.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let record = self.records.read().unwrap().get(host).cloned();
        match record {
            Some(record) => LookupOutcome::Found(record),
            None if self.failing => LookupOutcome::Failed(format!("no record for {}", host)),
            None => LookupOutcome::NotApplicable,
        }
    }
}

/// A mock fetcher serving predefined HTML by URL.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    delay: Option<Duration>,
    first_call_delay: Option<Duration>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), html.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stall only the very first fetch, whatever its URL.
    pub fn with_first_call_delay(mut self, delay: Duration) -> Self {
        self.first_call_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Option<FetchedDocument> {
        let first = {
            let mut calls = self.calls.write().unwrap();
            calls.push(url.to_string());
            calls.len() == 1
        };
        if let Some(delay) = self.first_call_delay.filter(|_| first) {
            tokio::time::sleep(delay).await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let html = self.pages.read().unwrap().get(url).cloned()?;
        let final_url = Url::parse(url).ok()?;
        Some(FetchedDocument::new(final_url, 200, &html))
    }
}

/// A mock search backend with predefined hits by query.
#[derive(Clone, Default)]
pub struct MockSearchBackend {
    hits: Arc<RwLock<HashMap<String, Vec<SearchHit>>>>,
    failing: bool,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with these URLs (possibly none).
    pub fn with_hits(self, query: impl Into<String>, urls: &[&str]) -> Self {
        let hits = urls.iter().map(|u| SearchHit::new(*u)).collect();
        self.hits.write().unwrap().insert(query.into(), hits);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn search(&self, query: &str) -> LookupOutcome<Vec<SearchHit>> {
        self.calls.write().unwrap().push(query.to_string());

        let hits = self.hits.read().unwrap().get(query).cloned();
        match hits {
            Some(hits) => LookupOutcome::Found(hits),
            None if self.failing => LookupOutcome::Failed("mock search failure".to_string()),
            None => LookupOutcome::NotApplicable,
        }
    }
}

/// A pacer that records pauses instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingPacer {
    pauses: Arc<RwLock<Vec<PauseKind>>>,
}

impl RecordingPacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pauses requested, in order.
    pub fn pauses(&self) -> Vec<PauseKind> {
        self.pauses.read().unwrap().clone()
    }

    pub fn count(&self, kind: PauseKind) -> usize {
        self.pauses.read().unwrap().iter().filter(|k| **k == kind).count()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, kind: PauseKind) {
        self.pauses.write().unwrap().push(kind);
    }
}

/// A classifier returning fixed answers.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier {
    probability: Option<f64>,
    class: f64,
}

impl FixedClassifier {
    /// Always reports `probability`.
    pub fn new(probability: f64) -> Self {
        Self {
            probability: Some(probability),
            class: if probability >= 0.5 { 1.0 } else { 0.0 },
        }
    }

    /// Has no probabilities; always predicts `class`.
    pub fn class_only(class: f64) -> Self {
        Self {
            probability: None,
            class,
        }
    }
}

impl Classifier for FixedClassifier {
    fn predict_proba(&self, _features: &FeatureVector) -> Option<f64> {
        self.probability
    }

    fn predict(&self, _features: &FeatureVector) -> f64 {
        self.class
    }
}
