//! Search-engine presence probe (F21).
//!
//! Asks whether a search engine has indexed anything under a hostname by
//! running a `site:` query through a chain of [`SearchBackend`]s.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::LookupOutcome;
use crate::error::{ConfigError, SearchError, SearchResult};
use crate::pacing::{NoPacer, Pacer, PauseKind};
use crate::types::config::SearchConfig;
use crate::types::feature::Signal;

const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
}

impl SearchHit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A search provider.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Run `query`. `Found` with an empty list means the provider answered
    /// and had nothing.
    async fn search(&self, query: &str) -> LookupOutcome<Vec<SearchHit>>;
}

/// Tavily-backed search.
///
/// Not applicable when no API key is configured.
pub struct TavilySearchBackend {
    api_key: Option<String>,
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl TavilySearchBackend {
    pub fn new(config: &SearchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            api_key: config.tavily_api_key.clone().filter(|k| !k.is_empty()),
            client,
            endpoint: TAVILY_ENDPOINT.to_string(),
            max_results: config.max_results,
        })
    }

    /// Point at a different API endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    async fn query(&self, api_key: &str, query: &str) -> SearchResult<Vec<SearchHit>> {
        #[derive(serde::Serialize)]
        struct Request<'a> {
            query: &'a str,
            search_depth: &'a str,
            max_results: usize,
        }

        #[derive(serde::Deserialize)]
        struct Response {
            #[serde(default)]
            results: Vec<TavilyResult>,
        }

        #[derive(serde::Deserialize)]
        struct TavilyResult {
            url: String,
            title: Option<String>,
        }

        let request = Request {
            query,
            search_depth: "basic",
            max_results: self.max_results,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let body: Response = response.json().await?;
        Ok(body
            .results
            .into_iter()
            .map(|r| {
                let hit = SearchHit::new(r.url);
                match r.title {
                    Some(title) => hit.with_title(title),
                    None => hit,
                }
            })
            .collect())
    }
}

#[async_trait]
impl SearchBackend for TavilySearchBackend {
    fn name(&self) -> &'static str {
        "tavily"
    }

    async fn search(&self, query: &str) -> LookupOutcome<Vec<SearchHit>> {
        let Some(api_key) = self.api_key.as_deref() else {
            return LookupOutcome::NotApplicable;
        };
        LookupOutcome::from_result(self.query(api_key, query).await)
    }
}

/// Scrapes a plain-HTML results page (DuckDuckGo's `html` endpoint layout).
pub struct HtmlSearchBackend {
    client: reqwest::Client,
    endpoint: String,
    max_results: usize,
}

impl HtmlSearchBackend {
    pub fn new(config: &SearchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36")
            .build()?;
        Ok(Self {
            client,
            endpoint: config.html_endpoint.clone(),
            max_results: config.max_results,
        })
    }

    async fn query(&self, query: &str) -> SearchResult<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?;

        // The endpoint answers 202 with a challenge page when it throttles.
        if response.status() != reqwest::StatusCode::OK {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Result links on an HTML results page.
pub fn parse_result_links(html: &str, limit: usize) -> Vec<SearchHit> {
    let selector = match Selector::parse("a.result__a") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    Html::parse_document(html)
        .select(&selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?.trim();
            if href.is_empty() {
                return None;
            }
            let title = a.text().collect::<String>();
            Some(SearchHit::new(href).with_title(title.trim()))
        })
        .take(limit)
        .collect()
}

/// Result links, or an empty list when the page explicitly says there
/// are none. Throttle pages and unknown layouts are errors.
pub fn parse_results_page(html: &str, limit: usize) -> SearchResult<Vec<SearchHit>> {
    let hits = parse_result_links(html, limit);
    if !hits.is_empty() || has_no_results_marker(html) {
        return Ok(hits);
    }
    Err(SearchError::UnrecognizedPage)
}

fn has_no_results_marker(html: &str) -> bool {
    let Ok(selector) = Selector::parse(".no-results") else {
        return false;
    };
    let document = Html::parse_document(html);
    if document.select(&selector).next().is_some() {
        return true;
    }
    document
        .root_element()
        .text()
        .any(|t| t.trim().eq_ignore_ascii_case("No results."))
}

#[async_trait]
impl SearchBackend for HtmlSearchBackend {
    fn name(&self) -> &'static str {
        "html"
    }

    async fn search(&self, query: &str) -> LookupOutcome<Vec<SearchHit>> {
        match self
            .query(query)
            .await
            .and_then(|html| parse_results_page(&html, self.max_results))
        {
            Ok(hits) => LookupOutcome::Found(hits),
            Err(e) => LookupOutcome::Failed(e.to_string()),
        }
    }
}

/// F21: has a search engine indexed this host?
pub struct SearchIndexProbe {
    backends: Vec<Arc<dyn SearchBackend>>,
    pacer: Arc<dyn Pacer>,
    timeout: Duration,
}

impl SearchIndexProbe {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>, timeout: Duration) -> Self {
        Self {
            backends,
            pacer: Arc::new(NoPacer),
            timeout,
        }
    }

    /// Tavily first, then the HTML results page.
    pub fn from_config(config: &SearchConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            vec![
                Arc::new(TavilySearchBackend::new(config)?),
                Arc::new(HtmlSearchBackend::new(config)?),
            ],
            config.timeout,
        ))
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    /// 1 when results exist, -1 when a backend answered with none, 0 when
    /// no backend could answer.
    pub async fn probe(&self, hostname: &str) -> Signal {
        if hostname.is_empty() {
            return Signal::Neutral;
        }

        self.pacer.pause(PauseKind::SearchProbe).await;
        let query = format!("site:{}", hostname);

        for backend in &self.backends {
            let outcome = tokio::time::timeout(self.timeout, backend.search(&query))
                .await
                .unwrap_or_else(|_| LookupOutcome::Failed("timed out".to_string()));

            match outcome {
                LookupOutcome::Found(hits) => {
                    debug!(hostname = %hostname, backend = backend.name(), hits = hits.len(), "search probe answered");
                    return Signal::flag(hits.is_empty());
                }
                LookupOutcome::NotApplicable => {
                    debug!(hostname = %hostname, backend = backend.name(), "search backend not applicable");
                }
                LookupOutcome::Failed(reason) => {
                    warn!(hostname = %hostname, backend = backend.name(), reason = %reason, "search backend failed");
                }
            }
        }

        Signal::Neutral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSearchBackend, RecordingPacer};
    use axum::extract::Query;
    use axum::response::Html as HtmlBody;
    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;

    const RESULTS_PAGE: &str = r#"<html><body>
        <div class="result"><h2><a class="result__a" href="https://example.com/">Example Domain</a></h2></div>
        <div class="result"><h2><a class="result__a" href="https://example.com/about">About</a></h2></div>
        <div class="result"><h2><a class="result__a" href="https://example.com/more">More</a></h2></div>
        <a class="nav" href="/next">Next</a>
    </body></html>"#;

    #[test]
    fn test_parse_result_links() {
        let hits = parse_result_links(RESULTS_PAGE, 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://example.com/");
        assert_eq!(hits[0].title.as_deref(), Some("Example Domain"));

        assert!(parse_result_links("<html><body>No results.</body></html>", 3).is_empty());
    }

    #[test]
    fn test_parse_results_page_needs_marker_for_empty() {
        assert_eq!(parse_results_page(RESULTS_PAGE, 3).unwrap().len(), 3);
        assert!(parse_results_page("<html><body><div class=\"no-results\">No results.</div></body></html>", 3)
            .unwrap()
            .is_empty());
        assert!(parse_results_page("<html><body>No results.</body></html>", 3)
            .unwrap()
            .is_empty());

        let challenge = "<html><body><form id=\"challenge-form\">Please verify you are human</form></body></html>";
        assert!(matches!(
            parse_results_page(challenge, 3),
            Err(SearchError::UnrecognizedPage)
        ));
    }

    #[tokio::test]
    async fn test_html_backend_challenge_page_is_failure() {
        let router = Router::new().route(
            "/html/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                match params.get("q").map(String::as_str) {
                    Some("site:indexed.example") => HtmlBody(RESULTS_PAGE.to_string()),
                    Some("site:fresh.example") => {
                        HtmlBody(r#"<html><body><div class="no-results">No results.</div></body></html>"#.to_string())
                    }
                    _ => HtmlBody("<html><body>Unusual traffic detected.</body></html>".to_string()),
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let config = SearchConfig {
            html_endpoint: format!("http://{}/html/", addr),
            ..SearchConfig::default()
        };
        let probe = SearchIndexProbe::new(
            vec![Arc::new(HtmlSearchBackend::new(&config).unwrap())],
            Duration::from_secs(5),
        );

        assert_eq!(probe.probe("indexed.example").await, Signal::Benign);
        assert_eq!(probe.probe("fresh.example").await, Signal::Suspicious);
        assert_eq!(probe.probe("throttled.example").await, Signal::Neutral);
    }

    #[tokio::test]
    async fn test_probe_signals() {
        let indexed = SearchIndexProbe::new(
            vec![Arc::new(MockSearchBackend::new().with_hits("site:example.com", &["https://example.com/"]))],
            Duration::from_secs(1),
        );
        assert_eq!(indexed.probe("example.com").await, Signal::Benign);

        let unknown = SearchIndexProbe::new(
            vec![Arc::new(MockSearchBackend::new().with_hits("site:fresh.xyz", &[]))],
            Duration::from_secs(1),
        );
        assert_eq!(unknown.probe("fresh.xyz").await, Signal::Suspicious);

        let exhausted = SearchIndexProbe::new(
            vec![
                Arc::new(MockSearchBackend::new()),
                Arc::new(MockSearchBackend::new().failing()),
            ],
            Duration::from_secs(1),
        );
        assert_eq!(exhausted.probe("example.com").await, Signal::Neutral);
    }

    #[tokio::test]
    async fn test_probe_falls_through_and_pauses_first() {
        let primary = MockSearchBackend::new().failing();
        let fallback = MockSearchBackend::new().with_hits("site:example.com", &["https://example.com/"]);
        let pacer = Arc::new(RecordingPacer::new());

        let probe = SearchIndexProbe::new(
            vec![Arc::new(primary.clone()), Arc::new(fallback.clone())],
            Duration::from_secs(1),
        )
        .with_pacer(pacer.clone());

        assert_eq!(probe.probe("example.com").await, Signal::Benign);
        assert_eq!(primary.calls(), vec!["site:example.com"]);
        assert_eq!(fallback.calls(), vec!["site:example.com"]);
        assert_eq!(pacer.pauses(), vec![PauseKind::SearchProbe]);
    }

    #[tokio::test]
    async fn test_tavily_backend() {
        let router = Router::new().route(
            "/search",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["query"], "site:example.com");
                Json(serde_json::json!({
                    "results": [{ "url": "https://example.com/", "title": "Example" }]
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        let without_key = TavilySearchBackend::new(&SearchConfig::default()).unwrap();
        assert_eq!(without_key.search("site:example.com").await, LookupOutcome::NotApplicable);

        let config = SearchConfig {
            tavily_api_key: Some("test-key".to_string()),
            ..SearchConfig::default()
        };
        let backend = TavilySearchBackend::new(&config)
            .unwrap()
            .with_endpoint(format!("http://{}/search", addr));

        let hits = backend.search("site:example.com").await.found().unwrap();
        assert_eq!(hits, vec![SearchHit::new("https://example.com/").with_title("Example")]);
    }
}
