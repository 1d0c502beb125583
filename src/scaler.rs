use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::features::{FeatureVector, Game};
use crate::model::ArtifactError;

/// Per-feature normalisation applied between the transform and the classifier.
pub trait Scaler: Send + Sync {
    /// Names the scaler was fitted on, in order, when the artifact records them.
    fn feature_names(&self) -> Option<&[String]>;

    fn num_features(&self) -> usize;

    /// Callers check the shape first; `values.len() == num_features()`.
    fn scale(&self, values: &[f64]) -> Vec<f64>;
}

/// Median / inter-quartile-range scaling, compatible with the `center_` and
/// `scale_` vectors of a fitted scikit-learn `RobustScaler`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    #[serde(default)]
    pub feature_names: Vec<String>,
    pub center: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default)]
    pub game: Option<Game>,
    #[serde(default)]
    pub samples: usize,
    #[serde(default)]
    pub generated_at: Option<String>,
}

impl RobustScaler {
    pub fn new(feature_names: Vec<String>, center: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        let scaler = Self {
            feature_names,
            center,
            scale,
            game: None,
            samples: 0,
            generated_at: None,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read scaler artifact {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parse scaler artifact {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let scaler = serde_json::from_str::<RobustScaler>(raw)?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize scaler artifact")?;
        fs::write(path, json).with_context(|| format!("write scaler artifact {}", path.display()))
    }

    /// Fits median and IQR per feature over `rows`, all of which must follow
    /// `game`'s feature contract.
    pub fn fit(game: Game, rows: &[FeatureVector]) -> Result<Self> {
        let names = game.feature_names();
        if rows.is_empty() {
            bail!("cannot fit a scaler on zero rows");
        }
        if let Some(bad) = rows.iter().position(|r| r.names() != names) {
            bail!("row {bad} does not follow the {game} feature contract");
        }

        let mut center = Vec::with_capacity(names.len());
        let mut scale = Vec::with_capacity(names.len());
        let mut column = Vec::with_capacity(rows.len());
        for idx in 0..names.len() {
            column.clear();
            column.extend(rows.iter().map(|r| r.values()[idx]));
            column.sort_by(|a, b| a.total_cmp(b));
            let q1 = percentile_sorted(&column, 0.25);
            let q3 = percentile_sorted(&column, 0.75);
            center.push(percentile_sorted(&column, 0.50));
            scale.push(q3 - q1);
        }

        Ok(Self {
            feature_names: names.iter().map(|n| n.to_string()).collect(),
            center,
            scale,
            game: Some(game),
            samples: rows.len(),
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
        })
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.center.len() != self.scale.len() {
            return Err(ArtifactError::LengthMismatch {
                what: "scaler scale",
                expected: self.center.len(),
                actual: self.scale.len(),
            });
        }
        if !self.feature_names.is_empty() && self.feature_names.len() != self.center.len() {
            return Err(ArtifactError::LengthMismatch {
                what: "scaler feature_names",
                expected: self.center.len(),
                actual: self.feature_names.len(),
            });
        }
        Ok(())
    }
}

impl Scaler for RobustScaler {
    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn num_features(&self) -> usize {
        self.center.len()
    }

    fn scale(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.center.iter().zip(&self.scale))
            .map(|(x, (c, s))| {
                // A constant training column has no spread to divide by.
                if *s == 0.0 || !s.is_finite() {
                    *x
                } else {
                    (x - c) / s
                }
            })
            .collect()
    }
}

/// Linear-interpolated percentile of an ascending slice (numpy's default).
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}
