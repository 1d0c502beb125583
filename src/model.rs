use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::xgboost::TreeEnsemble;

/// A trained binary classifier.
pub trait Classifier: Send + Sync {
    /// Input names in training order, if the artifact recorded them.
    fn feature_names(&self) -> Option<&[String]>;

    fn num_features(&self) -> usize;

    /// Probability of the positive class. `values.len() == num_features()`.
    fn predict_probability(&self, values: &[f64]) -> f64;

    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    #[error("{what} has {actual} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("tree {tree} is empty")]
    EmptyTree { tree: usize },
    #[error("tree {tree} node {node} points at child {child} (tree has {num_nodes} nodes)")]
    BadChild {
        tree: usize,
        node: usize,
        child: i64,
        num_nodes: usize,
    },
    #[error("tree {tree} node {node} splits on feature {feature} but the model has {num_features}")]
    BadSplitFeature {
        tree: usize,
        node: usize,
        feature: i64,
        num_features: usize,
    },
    #[error("tree {tree} node {node} uses a categorical split")]
    CategoricalSplit { tree: usize, node: usize },
    #[error("unsupported booster `{0}`")]
    UnsupportedBooster(String),
    #[error("unsupported objective `{0}`")]
    UnsupportedObjective(String),
    #[error("invalid value for `{field}`: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Plain logistic regression over the raw feature order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LogisticModel {
    pub fn new(feature_names: Vec<String>, coeffs: Vec<f64>, intercept: f64) -> Result<Self, ArtifactError> {
        let model = Self {
            feature_names,
            coeffs,
            intercept,
        };
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if !self.feature_names.is_empty() && self.feature_names.len() != self.coeffs.len() {
            return Err(ArtifactError::LengthMismatch {
                what: "logistic feature_names",
                expected: self.coeffs.len(),
                actual: self.feature_names.len(),
            });
        }
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn num_features(&self) -> usize {
        self.coeffs.len()
    }

    fn predict_probability(&self, values: &[f64]) -> f64 {
        let margin = self.intercept
            + self
                .coeffs
                .iter()
                .zip(values)
                .map(|(c, x)| c * x)
                .sum::<f64>();
        sigmoid(margin)
    }

    fn kind(&self) -> &'static str {
        "logistic"
    }
}

/// Loads either an XGBoost JSON dump or a logistic artifact, told apart by
/// the XGBoost `learner` root key.
pub fn load_classifier(path: &Path) -> Result<Box<dyn Classifier>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model artifact {}", path.display()))?;
    classifier_from_json(&raw).with_context(|| format!("parse model artifact {}", path.display()))
}

pub fn classifier_from_json(raw: &str) -> Result<Box<dyn Classifier>> {
    let value = serde_json::from_str::<serde_json::Value>(raw)?;
    if value.get("learner").is_some() {
        return Ok(Box::new(TreeEnsemble::from_value(value)?));
    }
    let model = serde_json::from_value::<LogisticModel>(value)?;
    model.validate()?;
    Ok(Box::new(model))
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
