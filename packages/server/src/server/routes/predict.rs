//! Prediction endpoints.
//!
//! GET  /predict?url=...   one URL, with its named features
//! POST /predict_batch     JSON array of URLs, one result per URL

use std::panic::AssertUnwindSafe;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    Json,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url_features::{classify, Classifier, FeatureVector, Prediction};

use crate::server::app::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub label: i8,
    pub probability: f64,
    /// Feature name to value, in vector order
    pub features: IndexMap<String, i8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchItem {
    pub url: String,
    /// -1 when the item failed
    pub label: i8,
    pub probability: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            label: -1,
            probability: 0.0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
}

/// Classify without letting a misbehaving model take the handler down.
fn guarded_classify(model: &dyn Classifier, features: &FeatureVector) -> Option<Prediction> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| classify(model, features))) {
        Ok(prediction) => Some(prediction),
        Err(_) => {
            tracing::error!("classifier panicked");
            None
        }
    }
}

/// Single-URL prediction.
pub async fn predict_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<PredictQuery>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    let url = query.url.unwrap_or_default();
    let url = url.trim();
    if url.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "url query parameter is required".to_string(),
            }),
        ));
    }

    // A single prediction gets the same budget as one batch item
    let budget = state.scheduler.config().url_timeout;
    let features = tokio::time::timeout(budget, state.extractor.extract(url))
        .await
        .map_err(|_| {
            tracing::warn!(url = %url, timeout = ?budget, "prediction timed out");
            (
                StatusCode::REQUEST_TIMEOUT,
                Json(ErrorResponse {
                    error: "feature extraction timed out".to_string(),
                }),
            )
        })?;
    let prediction = guarded_classify(state.model.as_ref(), &features).ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "prediction failed".to_string(),
            }),
        )
    })?;

    tracing::info!(
        url = %url,
        label = prediction.label,
        probability = prediction.probability,
        "prediction served"
    );

    Ok(Json(PredictResponse {
        label: prediction.label,
        probability: prediction.probability,
        features: features
            .named()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    }))
}

/// Batch prediction through the batch scheduler.
///
/// Never fails as a whole; failed items carry label -1 and an error string.
pub async fn predict_batch_handler(
    Extension(state): Extension<AppState>,
    Json(urls): Json<Vec<String>>,
) -> Json<BatchResponse> {
    let batch = state.scheduler.run(&urls).await;

    let results = urls
        .iter()
        .zip(&batch.vectors)
        .enumerate()
        .map(|(index, (url, features))| {
            if batch.is_failed(index) {
                return BatchItem::failed(url, "feature extraction failed");
            }
            match guarded_classify(state.model.as_ref(), features) {
                Some(prediction) => BatchItem {
                    url: url.clone(),
                    label: prediction.label,
                    probability: prediction.probability,
                    error: None,
                },
                None => BatchItem::failed(url, "prediction failed"),
            }
        })
        .collect();

    tracing::info!(
        urls = urls.len(),
        failed = batch.failed.len(),
        "batch prediction served"
    );

    Json(BatchResponse { results })
}
