use std::env;
use std::path::PathBuf;

use crate::features::Game;
use crate::inference::DEFAULT_PROBABILITY;

pub const DEFAULT_SUPPORT_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq)]
pub struct CoachConfig {
    pub game: Game,
    pub model_path: Option<PathBuf>,
    pub scaler_path: Option<PathBuf>,
    pub fallback_probability: f64,
    pub support_threshold: f64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            game: Game::Valorant,
            model_path: None,
            scaler_path: None,
            fallback_probability: DEFAULT_PROBABILITY,
            support_threshold: DEFAULT_SUPPORT_THRESHOLD,
        }
    }
}

impl CoachConfig {
    /// Reads `AEGIS_*` variables. Call `dotenvy::dotenv()` first to pick up a `.env`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let game = non_empty("AEGIS_GAME")
            .and_then(|v| v.parse::<Game>().ok())
            .unwrap_or(defaults.game);
        let fallback_probability = non_empty("AEGIS_FALLBACK_PROBABILITY")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(defaults.fallback_probability);
        let support_threshold = non_empty("AEGIS_SUPPORT_THRESHOLD")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(defaults.support_threshold);

        Self {
            game,
            model_path: non_empty("AEGIS_MODEL_PATH").map(|s| PathBuf::from(s.trim())),
            scaler_path: non_empty("AEGIS_SCALER_PATH").map(|s| PathBuf::from(s.trim())),
            fallback_probability,
            support_threshold,
        }
    }

    pub fn resolve_model_path(&self) -> Option<PathBuf> {
        let slug = self.game.slug();
        resolve(
            self.model_path.as_ref(),
            &[
                PathBuf::from(format!("{slug}_model.json")),
                PathBuf::from("data").join(slug).join(format!("{slug}_model.json")),
            ],
        )
    }

    pub fn resolve_scaler_path(&self) -> Option<PathBuf> {
        let slug = self.game.slug();
        resolve(
            self.scaler_path.as_ref(),
            &[
                PathBuf::from("scaler.json"),
                PathBuf::from("data").join(slug).join("scaler.json"),
            ],
        )
    }
}

// An explicit path wins outright, even when it does not exist.
fn resolve(explicit: Option<&PathBuf>, candidates: &[PathBuf]) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.clone());
    }
    candidates.iter().find(|p| p.exists()).cloned()
}
