//! Classifier boundary.
//!
//! The pipeline only produces feature vectors; anything that maps a vector
//! to a maliciousness score can sit behind [`Classifier`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ModelError;
use crate::types::feature::{FeatureVector, FEATURE_COUNT};

/// A trained model treated as a black box.
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    /// Probability of the malicious class, when the model provides one.
    fn predict_proba(&self, features: &FeatureVector) -> Option<f64>;

    /// Raw class prediction.
    fn predict(&self, features: &FeatureVector) -> f64;
}

/// A score plus the label derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub probability: f64,
    /// 1 when `probability >= 0.5`, else 0
    pub label: i8,
}

impl Prediction {
    pub fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            label: if probability >= 0.5 { 1 } else { 0 },
        }
    }
}

/// Score `features`, falling back to the raw class when the model has no
/// probabilities.
pub fn classify(model: &dyn Classifier, features: &FeatureVector) -> Prediction {
    let probability = model
        .predict_proba(features)
        .unwrap_or_else(|| model.predict(features));
    Prediction::from_probability(probability)
}

/// Logistic regression over the 22 feature values.
///
/// Loaded from JSON of the form `{"weights": [..22 numbers..], "bias": 0.0}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, ModelError> {
        if weights.len() != FEATURE_COUNT {
            return Err(ModelError::Shape {
                expected: FEATURE_COUNT,
                found: weights.len(),
            });
        }
        Ok(Self { weights, bias })
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let raw: LogisticModel = serde_json::from_str(json)?;
        Self::new(raw.weights, raw.bias)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        let z: f64 = features
            .as_f64()
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, features: &FeatureVector) -> Option<f64> {
        Some(self.score(features))
    }

    fn predict(&self, features: &FeatureVector) -> f64 {
        if self.score(features) >= 0.5 {
            1.0
        } else {
            0.0
        }
    }
}
