//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header::CONTENT_TYPE, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url_features::{BatchConfig, BatchScheduler, Classifier, FeatureExtractor, Pacer};

use crate::server::routes::{health_handler, predict_batch_handler, predict_handler};

/// Shared application state
///
/// Everything here is immutable after startup; handlers only read it.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<FeatureExtractor>,
    pub scheduler: Arc<BatchScheduler>,
    pub model: Arc<dyn Classifier>,
}

impl AppState {
    pub fn new(
        extractor: Arc<FeatureExtractor>,
        pacer: Arc<dyn Pacer>,
        batch: BatchConfig,
        model: Arc<dyn Classifier>,
    ) -> Self {
        let scheduler = Arc::new(BatchScheduler::new(extractor.clone(), pacer, batch));
        Self {
            extractor,
            scheduler,
            model,
        }
    }
}

/// Build the Axum application router
pub fn build_app(state: AppState) -> Router {
    // CORS configuration - browser extensions and local tools call the API directly
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route("/predict", get(predict_handler))
        .route("/predict_batch", post(predict_batch_handler))
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
