//! Integration tests for the extraction pipeline.
//!
//! These tests drive the public API end to end with mocked collaborators:
//! 1. Shape of every vector
//! 2. Stage gating for unresolvable hosts and failed fetches
//! 3. Batch chunking and failure bookkeeping
//! 4. Repeatability against an unchanged world

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use url_features::{
    BatchConfig, BatchScheduler, ExtractorConfig, Feature, FeatureExtractor, FeatureVector,
    FetchConfig, HttpFetcher, MockFetcher, MockRegistryBackend, MockResolver, MockSearchBackend,
    RecordingPacer, RegistrationRecord, Signal, FEATURE_COUNT,
};

/// Document-dependent slots and their no-document values.
const NO_DOCUMENT: [(Feature, i8); 7] = [
    (Feature::Favicon, 0),
    (Feature::RequestUrl, 0),
    (Feature::AnchorUrl, 0),
    (Feature::LinksInTags, 0),
    (Feature::Sfh, 1),
    (Feature::SubmitToEmail, 1),
    (Feature::Iframe, 1),
];

/// Helper to build an extractor over mocks with a fixed clock.
fn mocked_extractor(
    resolver: MockResolver,
    registry: MockRegistryBackend,
    fetcher: MockFetcher,
) -> FeatureExtractor {
    FeatureExtractor::builder(ExtractorConfig::default())
        .resolver(Arc::new(resolver))
        .registry_backends(vec![Arc::new(registry)])
        .fetcher(Arc::new(fetcher))
        .search_backends(vec![Arc::new(MockSearchBackend::new())])
        .clock(|| Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_every_vector_has_22_ternary_values() {
    let extractor = mocked_extractor(
        MockResolver::new().with_host("example.com", "93.184.216.34"),
        MockRegistryBackend::new(),
        MockFetcher::new().with_page("https://example.com/", "<html><body><a href='#'>x</a></body></html>"),
    );

    let inputs = [
        "https://example.com/",
        "http://192.168.0.1/x",
        "http://bit.ly/abc",
        "",
        "not a url at all",
        "http://user@evil.example.com//redirect?next=http://bank.example",
        "ftp://[::1]/file",
    ];

    for url in inputs {
        let values = extractor.extract(url).await.values();
        assert_eq!(values.len(), FEATURE_COUNT, "url {:?}", url);
        assert!(values.iter().all(|v| (-1..=1).contains(v)), "url {:?}: {:?}", url, values);
    }
}

#[tokio::test]
async fn test_lexical_signals_from_url_alone() {
    let extractor = mocked_extractor(MockResolver::new(), MockRegistryBackend::new(), MockFetcher::new());

    let ip = extractor.extract("http://192.168.0.1/x").await;
    assert_eq!(ip.get(Feature::IpAddress), Signal::Suspicious);

    let short = extractor.extract("http://bit.ly/abc").await;
    assert_eq!(short.get(Feature::ShorteningService), Signal::Suspicious);
}

#[tokio::test]
async fn test_unresolvable_host_row() {
    let fetcher = MockFetcher::new();
    let extractor = mocked_extractor(MockResolver::new(), MockRegistryBackend::new(), fetcher.clone());

    let v = extractor.extract("http://no-such-host.invalid/login").await;

    assert_eq!(v.get(Feature::DnsRecord).value(), -1);
    assert_eq!(v.get(Feature::RegistrationLength).value(), -1);
    assert_eq!(v.get(Feature::AbnormalUrl).value(), -1);
    assert_eq!(v.get(Feature::DomainAge).value(), -1);
    for (feature, expected) in NO_DOCUMENT {
        assert_eq!(v.get(feature).value(), expected, "{}", feature.name());
    }
    assert!(fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_refused_fetch_substitutes_document_features() {
    // Reserve a port, then close it so connections are refused.
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let fetcher = HttpFetcher::new(
        FetchConfig::new()
            .with_max_retries(0)
            .with_timeout(Duration::from_secs(2)),
    )
    .unwrap();
    let record = RegistrationRecord::new()
        .with_name("127.0.0.1")
        .with_creation_date(Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap())
        .with_expiration_date(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());

    let extractor = FeatureExtractor::builder(ExtractorConfig::default())
        .resolver(Arc::new(MockResolver::new().with_host("127.0.0.1", "127.0.0.1")))
        .registry_backends(vec![Arc::new(MockRegistryBackend::new().with_record("127.0.0.1", record))])
        .fetcher(Arc::new(fetcher))
        .search_backends(vec![Arc::new(MockSearchBackend::new())])
        .build()
        .unwrap();

    let url = format!("http://127.0.0.1:{}/login/http-update", port);
    let v = extractor.extract(&url).await;

    for (feature, expected) in NO_DOCUMENT {
        assert_eq!(v.get(feature).value(), expected, "{}", feature.name());
    }
    // Still derived from the URL string.
    assert_eq!(v.get(Feature::HttpsToken), Signal::Suspicious);
    assert_eq!(v.get(Feature::DnsRecord), Signal::Benign);
}

#[tokio::test]
async fn test_batch_chunks_and_failures() {
    let resolver = MockResolver::new().with_host("stuck.example", "93.184.216.34");
    let fetcher = MockFetcher::new()
        .with_page("http://stuck.example/", "<html></html>")
        .with_delay(Duration::from_secs(5));
    let extractor = Arc::new(mocked_extractor(resolver, MockRegistryBackend::new(), fetcher));
    let pacer = Arc::new(RecordingPacer::new());

    let scheduler = BatchScheduler::new(
        extractor,
        pacer.clone(),
        BatchConfig::new()
            .with_chunk_size(4)
            .with_url_timeout(Duration::from_millis(200)),
    );

    let mut urls: Vec<String> = (0..9).map(|i| format!("http://host{}.invalid/", i)).collect();
    urls[5] = "http://stuck.example/".to_string();

    let result = scheduler.run(&urls).await;

    assert_eq!(result.chunks, 3); // ceil(9 / 4)
    assert_eq!(result.vectors.len(), 9);
    assert_eq!(result.failed.len(), 1);
    assert!(result.is_failed(5));
    assert_eq!(result.vectors[5].values(), [0; FEATURE_COUNT]);
    assert_eq!(result.succeeded(), 8);
}

#[tokio::test]
async fn test_repeat_extraction_is_stable() {
    let record = RegistrationRecord::new()
        .with_name("example.com")
        .with_creation_date(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap())
        .with_expiration_date(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
    let page = r#"<html><body>
        <img src="/logo.png"><img src="https://cdn.other.net/a.png">
        <a href="/about">About</a><a href="https://other.net/">Out</a>
        <form action="/login"></form>
    </body></html>"#;

    let extractor = mocked_extractor(
        MockResolver::new().with_host("example.com", "93.184.216.34"),
        MockRegistryBackend::new().with_record("example.com", record),
        MockFetcher::new().with_page("https://example.com/account", page),
    );

    let first = extractor.extract("https://example.com/account").await;
    let second = extractor.extract("https://example.com/account").await;

    assert_eq!(first, second);
    assert_ne!(first, FeatureVector::neutral());
}
