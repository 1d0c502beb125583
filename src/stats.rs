use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A single cell of a stat feed. Live feeds and CSV exports mix bare numbers,
/// numeric strings and percentage strings ("30%") for the same columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Number(f64),
    Text(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("stat `{field}` is not a number: {value:?}")]
    NotANumber { field: String, value: String },
    #[error("stat `{field}` is not a percentage: {value:?}")]
    NotAPercentage { field: String, value: String },
}

/// Flat per-player (or per-team) stat line, keyed by the column name used by
/// the data source ("Kills", "Headshot %", "gold_earned", ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawStatRecord {
    fields: HashMap<String, StatValue>,
}

impl RawStatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<StatValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<StatValue>) {
        self.fields.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&StatValue> {
        match self.fields.get(name) {
            Some(StatValue::Missing) | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Numeric stat, `fallback` when absent or null.
    pub fn number(&self, name: &str, fallback: f64) -> Result<f64, FormatError> {
        match self.get(name) {
            None => Ok(fallback),
            Some(StatValue::Number(v)) => Ok(*v),
            Some(StatValue::Text(raw)) => parse_number(raw).ok_or_else(|| FormatError::NotANumber {
                field: name.to_string(),
                value: raw.clone(),
            }),
            Some(StatValue::Missing) => Ok(fallback),
        }
    }

    /// Percentage stat as a fraction, `fallback` when absent or null.
    ///
    /// Strings must carry the `%` sign; a bare number is taken to already be
    /// a fraction (that is how the training exports store it).
    pub fn fraction(&self, name: &str, fallback: f64) -> Result<f64, FormatError> {
        match self.get(name) {
            None => Ok(fallback),
            Some(StatValue::Number(v)) => Ok(*v),
            Some(StatValue::Text(raw)) => {
                parse_percentage(raw).ok_or_else(|| FormatError::NotAPercentage {
                    field: name.to_string(),
                    value: raw.clone(),
                })
            }
            Some(StatValue::Missing) => Ok(fallback),
        }
    }
}

impl FromIterator<(String, StatValue)> for RawStatRecord {
    fn from_iter<T: IntoIterator<Item = (String, StatValue)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Number(v)
    }
}

impl From<i32> for StatValue {
    fn from(v: i32) -> Self {
        StatValue::Number(v as f64)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

impl<T: Into<StatValue>> From<Option<T>> for StatValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(StatValue::Missing)
    }
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// "30%" -> 0.30. Anything without a trailing `%` is rejected.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let digits = s.strip_suffix('%')?;
    parse_number(digits).map(|v| v / 100.0)
}
