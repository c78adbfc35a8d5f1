//! Typed errors for the feature extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. None of these escape
//! [`FeatureExtractor::extract`](crate::FeatureExtractor::extract): each
//! stage turns its error into the documented substitution value.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// TLS handshake or connection setup failed
    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    /// Request exceeded the configured timeout
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Redirect chain exceeded the limit
    #[error("too many redirects")]
    TooManyRedirects,

    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Advertised or streamed body exceeds the cap
    #[error("content too large: {0} bytes")]
    ContentTooLarge(u64),

    /// Any other HTTP failure
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
}

impl FetchError {
    /// Transient failures are retried within the fetch budget.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Connect(_) | FetchError::Timeout(_) | FetchError::TooManyRedirects
        )
    }

    /// Classify a reqwest failure; `timeout` is the limit the request ran under.
    pub fn from_reqwest(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(timeout)
        } else if e.is_redirect() {
            FetchError::TooManyRedirects
        } else if e.is_connect() {
            FetchError::Connect(e)
        } else {
            FetchError::Http(e)
        }
    }
}

/// Errors raised by registration-record backends.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Network-level failure talking to the registry
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP failure talking to an RDAP server
    #[error("RDAP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Registry reports no such domain
    #[error("domain not found: {domain}")]
    NotFound { domain: String },

    /// Reply could not be interpreted
    #[error("malformed registry reply: {0}")]
    Malformed(String),

    /// Lookup exceeded its timeout
    #[error("registry lookup timed out")]
    Timeout,
}

/// Errors raised by search backends.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP failure talking to the search provider
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("search provider returned status {0}")]
    Status(u16),

    /// Page had neither result links nor a no-results marker
    #[error("unrecognized results page")]
    UnrecognizedPage,
}

/// Errors raised while loading or applying a classifier model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model file could not be read
    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),

    /// Model file is not valid JSON
    #[error("invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Weight vector does not match the feature count
    #[error("model expects {expected} weights, found {found}")]
    Shape { expected: usize, found: usize },
}

/// Errors raised by tabular ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// CSV could not be read or written
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Requested column is missing from the header row
    #[error("missing column: {0}")]
    MissingColumn(String),
}

/// Errors raised while building the extraction stack.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for registry operations.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Result type alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;
