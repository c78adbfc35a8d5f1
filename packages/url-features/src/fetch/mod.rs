//! Page retrieval.
//!
//! A [`Fetcher`] turns a URL into a parsed page, or reports it unavailable.
//! Retries, redirects and size caps are the implementation's concern; callers
//! only see `Some` or `None`.

mod http;

pub use http::HttpFetcher;

use async_trait::async_trait;

use crate::types::document::FetchedDocument;

/// Retrieves and parses a page.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. `None` means the page is unavailable for any reason.
    async fn fetch(&self, url: &str) -> Option<FetchedDocument>;
}
