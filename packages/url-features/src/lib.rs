//! Staged URL Feature Extraction Library
//!
//! Turns a raw URL into a fixed 22-element vector of ternary risk signals
//! (`-1` suspicious, `0` neutral, `1` benign) for a downstream classifier.
//!
//! # Design Philosophy
//!
//! **"Every URL gets a vector"**
//!
//! - Cheap lexical checks first, network-dependent checks only when they can succeed
//! - A host that does not resolve skips the fetch and the registry-derived checks
//! - Every fallible lookup degrades to a neutral signal, never to an error
//! - Each feature group is isolated: a failure in one leaves the others intact
//! - Politeness pauses are explicit and injectable
//!
//! # Usage
//!
//! ```rust,ignore
//! use url_features::{pacer_for, BatchScheduler, ExtractorConfig, FeatureExtractor};
//! use std::sync::Arc;
//!
//! let config = ExtractorConfig::default();
//! let extractor = Arc::new(FeatureExtractor::from_config(&config)?);
//!
//! // One URL
//! let vector = extractor.extract("http://example.com/login").await;
//! assert_eq!(vector.values().len(), 22);
//!
//! // Many URLs, chunked and paced
//! let pacer = pacer_for(&config.pacing);
//! let scheduler = BatchScheduler::new(extractor, pacer, Default::default());
//! let result = scheduler.run(&urls).await;
//! ```
//!
//! # Modules
//!
//! - [`types`] - Feature vector, documents, registration records, configuration
//! - [`extractors`] - Pure per-feature functions (lexical, document, registration)
//! - [`probes`] - DNS, registry, search-index and reputation lookups
//! - [`fetch`] - Page retrieval with retries and size caps
//! - [`pacing`] - Politeness pauses and rate limiting
//! - [`pipeline`] - Per-URL orchestration and batch scheduling
//! - [`classifier`] - Trained-model boundary
//! - [`ingest`] - CSV input and output
//! - [`testing`] - Mock implementations for testing

pub mod classifier;
pub mod error;
pub mod extractors;
pub mod fetch;
pub mod hostname;
pub mod ingest;
pub mod pacing;
pub mod pipeline;
pub mod probes;
pub mod testing;
pub mod types;

// Re-export core types at crate root
pub use classifier::{classify, Classifier, LogisticModel, Prediction};
pub use error::{ConfigError, FetchError, IngestError, ModelError, RegistryError, SearchError};
pub use fetch::{Fetcher, HttpFetcher};
pub use ingest::{extract_rows, read_url_rows, write_feature_rows, FeatureRow, UrlRow};
pub use pacing::{pacer_for, JitteredPacer, NoPacer, Pacer, PacerExt, PauseKind, RateLimitedPacer};
pub use pipeline::{BatchResult, BatchScheduler, FeatureExtractor, FeatureExtractorBuilder};
pub use probes::LookupOutcome;
pub use types::{
    config::{
        BatchConfig, ExtractorConfig, FetchConfig, PacingConfig, PauseRange, PopularityPolicy,
        RegistryConfig, SearchConfig,
    },
    document::{Document, Element, FetchedDocument},
    feature::{Feature, FeatureVector, Signal, FEATURE_COUNT},
    registration::RegistrationRecord,
};

// Re-export testing utilities
pub use testing::{
    FixedClassifier, MockFetcher, MockRegistryBackend, MockResolver, MockSearchBackend,
    RecordingPacer,
};
