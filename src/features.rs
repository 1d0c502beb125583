use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stats::{FormatError, RawStatRecord};

pub const VALORANT_FEATURE_NAMES: [&str; 11] = [
    "Deaths",
    "Headshot_Pct",
    "First Kills",
    "First Deaths",
    "Survival_Rate",
    "Headshot_Impact",
    "First_Blood_Dominance",
    "Damage_Per_Round",
    "Consistency",
    "First_Engagement",
    "Clutch_Factor",
];

pub const LOL_FEATURE_NAMES: [&str; 6] = ["kills", "deaths", "assists", "gold_earned", "KDA", "GPM"];

// Normalisers baked into the Valorant training export.
const ROUNDS_PER_HALF: f64 = 13.0;
const ADR_NORMALISER: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Game {
    Valorant,
    #[serde(alias = "lol")]
    LeagueOfLegends,
}

impl Game {
    pub fn feature_names(self) -> &'static [&'static str] {
        match self {
            Game::Valorant => &VALORANT_FEATURE_NAMES,
            Game::LeagueOfLegends => &LOL_FEATURE_NAMES,
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Game::Valorant => "valorant",
            Game::LeagueOfLegends => "lol",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Game {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "valorant" | "val" | "vct" => Ok(Game::Valorant),
            "lol" | "league" | "league_of_legends" => Ok(Game::LeagueOfLegends),
            other => Err(anyhow::anyhow!("unknown game {other:?}")),
        }
    }
}

/// Ordered, named model input. Names always come from a game's canonical
/// contract, so two vectors for the same game line up index by index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    names: &'static [&'static str],
    values: Vec<f64>,
}

impl FeatureVector {
    fn from_contract(names: &'static [&'static str], values: Vec<f64>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            names,
            values: values.into_iter().map(finite_or_zero).collect(),
        }
    }

    pub fn names(&self) -> &'static [&'static str] {
        self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.values[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.names.iter().copied().zip(self.values.iter().copied())
    }
}

/// Raw stat line -> model input for `game`.
pub fn transform(game: Game, raw: &RawStatRecord) -> Result<FeatureVector, FormatError> {
    match game {
        Game::Valorant => valorant_features(raw),
        Game::LeagueOfLegends => lol_features(raw),
    }
}

pub fn valorant_features(raw: &RawStatRecord) -> Result<FeatureVector, FormatError> {
    let kills = raw.number("Kills", 0.0)?;
    let deaths = raw.number("Deaths", 0.0)?;
    let assists = raw.number("Assists", 0.0)?;
    let hs_pct = raw.fraction("Headshot %", 0.0)?;
    let fk = raw.number("First Kills", 0.0)?;
    let fd = raw.number("First Deaths", 0.0)?;
    let adr = raw.number("Average Damage Per Round", 0.0)?;

    let values = vec![
        deaths,
        hs_pct,
        fk,
        fd,
        survival_rate(deaths),
        hs_pct * kills,
        fk - fd,
        adr / ADR_NORMALISER,
        survival_rate(deaths),
        (fk + fd) / (2.0 * ROUNDS_PER_HALF),
        (kills - assists) / (kills + 1.0),
    ];
    Ok(FeatureVector::from_contract(&VALORANT_FEATURE_NAMES, values))
}

pub fn lol_features(raw: &RawStatRecord) -> Result<FeatureVector, FormatError> {
    let kills = raw.number("kills", 0.0)?;
    let deaths = raw.number("deaths", 0.0)?;
    let assists = raw.number("assists", 0.0)?;
    let gold = raw.number("gold_earned", 0.0)?;
    let duration_secs = raw.number("game_duration", 0.0)?;

    let values = vec![
        kills,
        deaths,
        assists,
        gold,
        (kills + assists) / (deaths + 1.0),
        gold / (duration_secs / 60.0),
    ];
    Ok(FeatureVector::from_contract(&LOL_FEATURE_NAMES, values))
}

pub fn survival_rate(deaths: f64) -> f64 {
    1.0 / (deaths + 1.0)
}

pub fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}
