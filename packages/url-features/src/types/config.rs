//! Configuration types for extraction, fetching and batch scheduling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum page body accepted by the fetcher (5 MiB).
pub const MAX_CONTENT_BYTES: u64 = 5 * 1024 * 1024;

/// Configuration for the HTTP resource fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Browser-like user agent.
    pub user_agent: String,

    /// Per-attempt request timeout. Default: 10s.
    pub timeout: Duration,

    /// Retries after the first attempt, for transient failures only.
    /// Default: 2.
    pub max_retries: u32,

    /// Redirects followed before giving up. Default: 10.
    pub max_redirects: usize,

    /// Bodies larger than this are treated as unavailable.
    pub max_content_bytes: u64,

    /// Skip TLS certificate verification for this fetcher only. Default: true.
    pub insecure_transport: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
            max_redirects: 10,
            max_content_bytes: MAX_CONTENT_BYTES,
            insecure_transport: true,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_max_content_bytes(mut self, bytes: u64) -> Self {
        self.max_content_bytes = bytes;
        self
    }

    pub fn with_insecure_transport(mut self, insecure: bool) -> Self {
        self.insecure_transport = insecure;
        self
    }
}

/// Configuration for registration-record lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// RDAP bootstrap/redirect service. Default: `https://rdap.org`.
    pub rdap_base_url: String,

    /// WHOIS server used for TLD referrals. Default: `whois.iana.org:43`.
    pub whois_referral_server: String,

    /// Timeout applied to each backend call. Default: 10s.
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            rdap_base_url: "https://rdap.org".to_string(),
            whois_referral_server: "whois.iana.org:43".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration for the search-index probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Tavily API key; without it the Tavily shape reports not-applicable.
    #[serde(skip_serializing)]
    pub tavily_api_key: Option<String>,

    /// HTML results endpoint for the fallback shape.
    pub html_endpoint: String,

    /// Results requested per probe. Default: 3.
    pub max_results: usize,

    /// Timeout applied to each backend call. Default: 10s.
    pub timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            html_endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 3,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Thresholds for the popularity heuristic (F20).
///
/// These are policy, not correctness: tune them per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularityPolicy {
    /// Hostnames containing any of these are treated as popular.
    pub allowlist: Vec<String>,

    /// At most this many labels...
    pub benign_max_labels: usize,

    /// ...and shorter than this many characters counts as benign.
    pub benign_max_len: usize,

    /// Longer than this is suspicious.
    pub suspicious_min_len: usize,

    /// More labels than this is suspicious.
    pub suspicious_max_labels: usize,
}

impl Default for PopularityPolicy {
    fn default() -> Self {
        Self {
            allowlist: [
                "google.com",
                "youtube.com",
                "facebook.com",
                "twitter.com",
                "instagram.com",
                "linkedin.com",
                "github.com",
                "stackoverflow.com",
                "wikipedia.org",
                "amazon.com",
                "microsoft.com",
                "apple.com",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            benign_max_labels: 2,
            benign_max_len: 15,
            suspicious_min_len: 30,
            suspicious_max_labels: 4,
        }
    }
}

/// Configuration for a [`FeatureExtractor`](crate::FeatureExtractor) built
/// from the live network stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    pub fetch: FetchConfig,
    pub registry: RegistryConfig,
    pub search: SearchConfig,
    pub popularity: PopularityPolicy,
    pub pacing: PacingConfig,

    /// Timeout for each DNS lookup. Default: 5s.
    #[serde(default = "default_dns_timeout")]
    pub dns_timeout: Duration,
}

fn default_dns_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            registry: RegistryConfig::default(),
            search: SearchConfig::default(),
            popularity: PopularityPolicy::default(),
            pacing: PacingConfig::default(),
            dns_timeout: default_dns_timeout(),
        }
    }
}

impl ExtractorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    pub fn with_popularity(mut self, popularity: PopularityPolicy) -> Self {
        self.popularity = popularity;
        self
    }

    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_tavily_api_key(mut self, key: impl Into<String>) -> Self {
        self.search.tavily_api_key = Some(key.into());
        self
    }
}

/// A closed range of seconds a jittered pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PauseRange {
    pub min_secs: f64,
    pub max_secs: f64,
}

impl PauseRange {
    pub const fn new(min_secs: f64, max_secs: f64) -> Self {
        Self { min_secs, max_secs }
    }

    pub const ZERO: PauseRange = PauseRange::new(0.0, 0.0);
}

/// Pause ranges per pacing point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Between URLs within a chunk. Default: 0.1-0.5s.
    pub between_urls: PauseRange,

    /// Between chunks. Default: 2-5s.
    pub between_batches: PauseRange,

    /// Between fetch attempts. Default: 0.5-2s.
    pub fetch_retry: PauseRange,

    /// Before each search-index probe. Default: 0.3-0.8s.
    pub search_probe: PauseRange,

    /// Token-bucket cap on pauses per second, on top of the ranges.
    /// Default: none.
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            between_urls: PauseRange::new(0.1, 0.5),
            between_batches: PauseRange::new(2.0, 5.0),
            fetch_retry: PauseRange::new(0.5, 2.0),
            search_probe: PauseRange::new(0.3, 0.8),
            requests_per_second: None,
        }
    }
}

impl PacingConfig {
    /// No pauses at all; for tests and offline runs.
    pub fn none() -> Self {
        Self {
            between_urls: PauseRange::ZERO,
            between_batches: PauseRange::ZERO,
            fetch_retry: PauseRange::ZERO,
            search_probe: PauseRange::ZERO,
            requests_per_second: None,
        }
    }

    /// Cap outbound pacing points at `rps` per second. Zero clears the cap.
    pub fn with_rate_limit(mut self, rps: u32) -> Self {
        self.requests_per_second = (rps > 0).then_some(rps);
        self
    }
}

/// Configuration for the batch scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// URLs per chunk. Default: 25.
    pub chunk_size: usize,

    /// URLs extracted concurrently. Default: 1 (strictly sequential).
    pub concurrency: usize,

    /// Upper bound for one URL's extraction; exceeding it marks the URL
    /// failed. Default: 120s.
    pub url_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 25,
            concurrency: 1,
            url_timeout: Duration::from_secs(120),
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_url_timeout(mut self, timeout: Duration) -> Self {
        self.url_timeout = timeout;
        self
    }

    /// Number of chunks `n` URLs are split into.
    pub fn chunk_count(&self, n: usize) -> usize {
        n.div_ceil(self.chunk_size.max(1))
    }
}
