use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::inference::{Engine, PredictError, Prediction};
use crate::stats::RawStatRecord;

/// One scoreboard pull: every player with their current stat line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchSnapshot {
    #[serde(default)]
    pub players: Vec<PlayerLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLine {
    #[serde(default = "unknown")]
    pub name: String,
    #[serde(default = "unknown")]
    pub team: String,
    #[serde(default)]
    pub stats: RawStatRecord,
}

fn unknown() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    SupportImpact,
    EntryFrags,
}

impl Recommendation {
    pub fn for_probability(p: f64, threshold: f64) -> Self {
        if p > threshold {
            Recommendation::SupportImpact
        } else {
            Recommendation::EntryFrags
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::SupportImpact => f.write_str("Support Role High Impact"),
            Recommendation::EntryFrags => f.write_str("Focus on Entry/Frags"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerReport {
    pub name: String,
    pub team: String,
    pub outcome: Result<(Prediction, Recommendation), PredictError>,
}

impl PlayerReport {
    pub fn prediction(&self) -> Option<&Prediction> {
        self.outcome.as_ref().ok().map(|(p, _)| p)
    }

    pub fn recommendation(&self) -> Option<Recommendation> {
        self.outcome.as_ref().ok().map(|(_, r)| *r)
    }
}

/// Scores every player in parallel. Reports come back in input order and a
/// malformed stat line only fails its own report.
pub fn predict_roster(engine: &Engine, snapshot: &MatchSnapshot, support_threshold: f64) -> Vec<PlayerReport> {
    snapshot
        .players
        .par_iter()
        .map(|player| {
            let outcome = engine.predict_raw(&player.stats).map(|prediction| {
                let rec = Recommendation::for_probability(prediction.probability, support_threshold);
                (prediction, rec)
            });
            if let Err(err) = &outcome {
                tracing::warn!(player = %player.name, team = %player.team, error = %err, "could not score player");
            }
            PlayerReport {
                name: player.name.clone(),
                team: player.team.clone(),
                outcome,
            }
        })
        .collect()
}
