//! HTTP fetcher backed by `reqwest`.

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::sync::Arc;
use tracing::{debug, warn};

use super::Fetcher;
use crate::error::{ConfigError, FetchError, FetchResult};
use crate::pacing::{NoPacer, Pacer, PauseKind};
use crate::types::config::FetchConfig;
use crate::types::document::FetchedDocument;

/// Fetches pages over HTTP with browser-like headers.
///
/// Transient failures (connection or TLS errors, timeouts, redirect loops)
/// are retried up to `max_retries` times with a [`PauseKind::FetchRetry`]
/// pause in between. Everything else, including non-2xx answers, makes the
/// page unavailable immediately.
///
/// # Example
///
/// ```rust,ignore
/// let fetcher = HttpFetcher::new(FetchConfig::default())?;
/// if let Some(page) = fetcher.fetch("https://example.com").await {
///     println!("{} elements", page.document.elements().len());
/// }
/// ```
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    pacer: Arc<dyn Pacer>,
}

impl HttpFetcher {
    /// Build a fetcher; certificate checks follow `config.insecure_transport`.
    pub fn new(config: FetchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(browser_headers())
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.insecure_transport)
            .build()?;

        Ok(Self {
            client,
            config,
            pacer: Arc::new(NoPacer),
        })
    }

    /// Set the pacer consulted between attempts.
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    async fn fetch_once(&self, url: &str) -> FetchResult<FetchedDocument> {
        let timeout = self.config.timeout;
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let cap = self.config.max_content_bytes;
        if let Some(advertised) = response.content_length() {
            if advertised > cap {
                return Err(FetchError::ContentTooLarge(advertised));
            }
        }

        let final_url = response.url().clone();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(e, timeout))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > cap {
                return Err(FetchError::ContentTooLarge(body.len() as u64));
            }
        }

        let html = String::from_utf8_lossy(&body);
        Ok(FetchedDocument::new(final_url, status.as_u16(), &html))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Option<FetchedDocument> {
        let attempts = self.config.max_retries + 1;

        for attempt in 1..=attempts {
            debug!(url = %url, attempt, "HTTP fetch starting");
            match self.fetch_once(url).await {
                Ok(page) => {
                    debug!(
                        url = %url,
                        final_url = %page.final_url,
                        status = page.status,
                        bytes = page.content_length,
                        "HTTP fetch succeeded"
                    );
                    return Some(page);
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(url = %url, attempt, error = %e, "transient fetch failure, retrying");
                    self.pacer.pause(PauseKind::FetchRetry).await;
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "page unavailable");
                    return None;
                }
            }
        }

        None
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPacer;
    use axum::{http::StatusCode, response::Redirect, routing::get, Router};
    use std::time::Duration;

    const PAGE: &str = r#"<html><head><link rel="icon" href="/favicon.ico"></head>
        <body><a href="/about">About</a><form action="/login"></form></body></html>"#;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn site() -> Router {
        Router::new()
            .route("/ok", get(|| async { axum::response::Html(PAGE) }))
            .route("/moved", get(|| async { Redirect::temporary("/ok") }))
            .route("/loop", get(|| async { Redirect::temporary("/loop") }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route("/big", get(|| async { "x".repeat(4096) }))
    }

    fn config() -> FetchConfig {
        FetchConfig::default().with_timeout(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fetch_parses_page() {
        let base = serve(site()).await;
        let fetcher = HttpFetcher::new(config()).unwrap();

        let page = fetcher.fetch(&format!("{}/ok", base)).await.unwrap();
        assert_eq!(page.status, 200);
        assert_eq!(page.document.tags_with("a", "href").count(), 1);
        assert_eq!(page.document.tags_with("form", "action").count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_follows_redirects() {
        let base = serve(site()).await;
        let fetcher = HttpFetcher::new(config()).unwrap();

        let page = fetcher.fetch(&format!("{}/moved", base)).await.unwrap();
        assert!(page.final_url.as_str().ends_with("/ok"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_retried() {
        let base = serve(site()).await;
        let pacer = Arc::new(RecordingPacer::new());
        let fetcher = HttpFetcher::new(config()).unwrap().with_pacer(pacer.clone());

        assert!(fetcher.fetch(&format!("{}/missing", base)).await.is_none());
        assert!(pacer.pauses().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_is_unavailable() {
        let base = serve(site()).await;
        let fetcher = HttpFetcher::new(config().with_max_content_bytes(1024)).unwrap();

        assert!(fetcher.fetch(&format!("{}/big", base)).await.is_none());
        assert!(fetcher.fetch(&format!("{}/ok", base)).await.is_some());
    }

    #[tokio::test]
    async fn test_redirect_loop_is_retried() {
        let base = serve(site()).await;
        let pacer = Arc::new(RecordingPacer::new());
        let fetcher = HttpFetcher::new(config()).unwrap().with_pacer(pacer.clone());

        assert!(fetcher.fetch(&format!("{}/loop", base)).await.is_none());
        assert_eq!(pacer.count(PauseKind::FetchRetry), 2);
    }

    #[tokio::test]
    async fn test_connection_refused_retries_then_gives_up() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let pacer = Arc::new(RecordingPacer::new());
        let fetcher = HttpFetcher::new(config().with_max_retries(2))
            .unwrap()
            .with_pacer(pacer.clone());

        assert!(fetcher.fetch(&format!("http://{}/", addr)).await.is_none());
        assert_eq!(pacer.count(PauseKind::FetchRetry), 2);
    }
}
