use std::fmt;

use anyhow::Result;
use serde::Serialize;

use crate::config::CoachConfig;
use crate::features::{FeatureVector, Game, transform};
use crate::model::{Classifier, load_classifier};
use crate::scaler::{RobustScaler, Scaler};
use crate::stats::{FormatError, RawStatRecord};

/// Returned when no model or scaler is available.
pub const DEFAULT_PROBABILITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Win,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PredictionQuality {
    /// Scaled and scored by a trained classifier.
    Model,
    /// Neutral fallback; no artifact was available.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub label: Outcome,
    pub confidence: u8,
    pub quality: PredictionQuality,
}

impl Prediction {
    fn from_model(probability: f64) -> Self {
        Self {
            probability,
            label: label_for(probability),
            confidence: compute_confidence(probability),
            quality: PredictionQuality::Model,
        }
    }

    pub fn degraded(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            probability,
            label: label_for(probability),
            confidence: 0,
            quality: PredictionQuality::Degraded,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.quality == PredictionQuality::Degraded
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scaler,
    Classifier,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Scaler => f.write_str("scaler"),
            Stage::Classifier => f.write_str("classifier"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("{stage} expects {expected} features, got {actual}")]
    FeatureCount {
        stage: Stage,
        expected: usize,
        actual: usize,
    },
    #[error("{stage} expects `{expected}` at position {index}, got `{actual}`")]
    FeatureOrder {
        stage: Stage,
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("classifier returned a non-finite probability")]
    NonFiniteOutput,
}

/// Either half of the raw-stats -> prediction pipeline can fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Scales `features` and scores them. Without both a scaler and a model the
/// result is [`DEFAULT_PROBABILITY`] flagged as degraded.
pub fn predict(
    features: &FeatureVector,
    scaler: Option<&dyn Scaler>,
    model: Option<&dyn Classifier>,
) -> Result<Prediction, InferenceError> {
    predict_with_fallback(features, scaler, model, DEFAULT_PROBABILITY)
}

pub fn predict_with_fallback(
    features: &FeatureVector,
    scaler: Option<&dyn Scaler>,
    model: Option<&dyn Classifier>,
    fallback: f64,
) -> Result<Prediction, InferenceError> {
    let (Some(scaler), Some(model)) = (scaler, model) else {
        return Ok(Prediction::degraded(fallback));
    };

    check_shape(Stage::Scaler, features, scaler.num_features(), scaler.feature_names())?;
    check_shape(Stage::Classifier, features, model.num_features(), model.feature_names())?;

    let scaled = scaler.scale(features.values());
    let p = model.predict_probability(&scaled);
    if !p.is_finite() {
        return Err(InferenceError::NonFiniteOutput);
    }
    Ok(Prediction::from_model(p.clamp(0.0, 1.0)))
}

fn check_shape(
    stage: Stage,
    features: &FeatureVector,
    expected_len: usize,
    expected_names: Option<&[String]>,
) -> Result<(), InferenceError> {
    if features.len() != expected_len {
        return Err(InferenceError::FeatureCount {
            stage,
            expected: expected_len,
            actual: features.len(),
        });
    }
    let Some(expected_names) = expected_names else {
        return Ok(());
    };
    for (index, (want, got)) in expected_names.iter().zip(features.names()).enumerate() {
        if want.as_str() != *got {
            return Err(InferenceError::FeatureOrder {
                stage,
                index,
                expected: want.clone(),
                actual: got.to_string(),
            });
        }
    }
    Ok(())
}

fn label_for(p: f64) -> Outcome {
    if p >= 0.5 { Outcome::Win } else { Outcome::Loss }
}

/// Distance from a coin flip, 0..=100.
fn compute_confidence(p: f64) -> u8 {
    ((p - 0.5).abs() * 200.0).round().clamp(0.0, 100.0) as u8
}

/// The scoring backend, chosen once at startup.
pub enum Engine {
    Model {
        game: Game,
        scaler: Box<dyn Scaler>,
        classifier: Box<dyn Classifier>,
    },
    Null {
        game: Game,
        probability: f64,
    },
}

impl Engine {
    pub fn with_model(game: Game, scaler: Box<dyn Scaler>, classifier: Box<dyn Classifier>) -> Self {
        Engine::Model {
            game,
            scaler,
            classifier,
        }
    }

    pub fn null(game: Game) -> Self {
        Engine::Null {
            game,
            probability: DEFAULT_PROBABILITY,
        }
    }

    /// Uses the configured artifacts when both files exist and falls back to
    /// the null engine when either is missing. An artifact that exists but
    /// does not parse is an error.
    pub fn load(config: &CoachConfig) -> Result<Self> {
        let null = Engine::Null {
            game: config.game,
            probability: config.fallback_probability,
        };
        let Some(model_path) = config.resolve_model_path() else {
            tracing::warn!(game = %config.game, "model artifact not found, running degraded");
            return Ok(null);
        };
        let Some(scaler_path) = config.resolve_scaler_path() else {
            tracing::warn!(game = %config.game, "scaler artifact not found, running degraded");
            return Ok(null);
        };

        let classifier = load_classifier(&model_path)?;
        let scaler = RobustScaler::load(&scaler_path)?;
        tracing::info!(
            game = %config.game,
            model = %model_path.display(),
            scaler = %scaler_path.display(),
            kind = classifier.kind(),
            features = classifier.num_features(),
            "loaded model artifacts"
        );
        Ok(Engine::with_model(config.game, Box::new(scaler), classifier))
    }

    pub fn game(&self) -> Game {
        match self {
            Engine::Model { game, .. } | Engine::Null { game, .. } => *game,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Engine::Null { .. })
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, InferenceError> {
        match self {
            Engine::Model {
                scaler, classifier, ..
            } => predict(features, Some(&**scaler), Some(&**classifier)),
            Engine::Null { probability, .. } => {
                predict_with_fallback(features, None, None, *probability)
            }
        }
    }

    /// transform -> scale -> classify for this engine's game.
    pub fn predict_raw(&self, raw: &RawStatRecord) -> Result<Prediction, PredictError> {
        let features = transform(self.game(), raw)?;
        let prediction = self.predict(&features)?;
        tracing::debug!(
            game = %self.game(),
            probability = prediction.probability,
            quality = ?prediction.quality,
            "scored stat line"
        );
        Ok(prediction)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Model {
                game, classifier, ..
            } => f
                .debug_struct("Engine::Model")
                .field("game", game)
                .field("classifier", &classifier.kind())
                .field("features", &classifier.num_features())
                .finish(),
            Engine::Null { game, probability } => f
                .debug_struct("Engine::Null")
                .field("game", game)
                .field("probability", probability)
                .finish(),
        }
    }
}
