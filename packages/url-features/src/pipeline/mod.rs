//! Extraction pipeline.
//!
//! - [`orchestrator`]: one URL to one [`FeatureVector`](crate::FeatureVector)
//! - [`batch`]: many URLs, chunked and paced

pub mod batch;
pub mod orchestrator;

pub use batch::{BatchResult, BatchScheduler};
pub use orchestrator::{FeatureExtractor, FeatureExtractorBuilder, RegistrationState};
