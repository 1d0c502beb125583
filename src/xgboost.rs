//! Evaluator for gradient-boosted tree ensembles saved with XGBoost's
//! `save_model("*.json")`.
//!
//! Only what binary classification needs is read: the `gbtree` booster, the
//! logistic objectives and numeric splits. Everything else in the dump is
//! ignored by serde.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::model::{ArtifactError, Classifier, sigmoid};

#[derive(Debug, Deserialize)]
struct XgbModel {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDef,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    #[serde(deserialize_with = "scalar_f64")]
    base_score: f64,
    #[serde(default, deserialize_with = "scalar_usize")]
    num_feature: usize,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<GbTreeModel>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModel {
    trees: Vec<XgbTree>,
}

#[derive(Debug, Deserialize)]
struct XgbTree {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    #[serde(default, deserialize_with = "bool_list")]
    default_left: Vec<bool>,
    #[serde(default)]
    split_type: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Node {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_value(&self, values: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf(v) => return v as f64,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let x = values.get(feature).copied().unwrap_or(f64::NAN);
                    idx = if x.is_nan() {
                        if default_left { left } else { right }
                    } else if (x as f32) < threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    feature_names: Vec<String>,
    num_features: usize,
    base_margin: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read xgboost model {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parse xgboost model {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(raw)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let model = serde_json::from_value::<XgbModel>(value)?;
        Ok(Self::convert(model.learner)?)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn base_margin(&self) -> f64 {
        self.base_margin
    }

    /// Raw additive score before the sigmoid.
    pub fn margin(&self, values: &[f64]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.leaf_value(values)).sum::<f64>()
    }

    fn convert(learner: Learner) -> Result<Self, ArtifactError> {
        let base_margin = match learner.objective.name.as_str() {
            "binary:logistic" | "reg:logistic" => {
                let p = learner.learner_model_param.base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            other => return Err(ArtifactError::UnsupportedObjective(other.to_string())),
        };

        if learner.gradient_booster.name != "gbtree" {
            return Err(ArtifactError::UnsupportedBooster(learner.gradient_booster.name));
        }
        let xgb_trees = learner
            .gradient_booster
            .model
            .map(|m| m.trees)
            .unwrap_or_default();

        let num_features = if learner.learner_model_param.num_feature > 0 {
            learner.learner_model_param.num_feature
        } else {
            learner.feature_names.len()
        };
        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_features {
            return Err(ArtifactError::LengthMismatch {
                what: "model feature_names",
                expected: num_features,
                actual: learner.feature_names.len(),
            });
        }

        let trees = xgb_trees
            .iter()
            .enumerate()
            .map(|(idx, t)| convert_tree(idx, t, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            feature_names: learner.feature_names,
            num_features,
            base_margin,
            trees,
        })
    }
}

impl Classifier for TreeEnsemble {
    fn feature_names(&self) -> Option<&[String]> {
        if self.feature_names.is_empty() {
            None
        } else {
            Some(&self.feature_names)
        }
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict_probability(&self, values: &[f64]) -> f64 {
        sigmoid(self.margin(values))
    }

    fn kind(&self) -> &'static str {
        "xgboost"
    }
}

fn convert_tree(tree: usize, raw: &XgbTree, num_features: usize) -> Result<Tree, ArtifactError> {
    let n = raw.left_children.len();
    if n == 0 {
        return Err(ArtifactError::EmptyTree { tree });
    }
    for (what, len) in [
        ("right_children", raw.right_children.len()),
        ("split_indices", raw.split_indices.len()),
        ("split_conditions", raw.split_conditions.len()),
    ] {
        if len != n {
            return Err(ArtifactError::LengthMismatch {
                what,
                expected: n,
                actual: len,
            });
        }
    }

    let mut nodes = Vec::with_capacity(n);
    for node in 0..n {
        let left = raw.left_children[node];
        if left == -1 {
            nodes.push(Node::Leaf(raw.split_conditions[node]));
            continue;
        }
        if raw.split_type.get(node).copied().unwrap_or(0) != 0 {
            return Err(ArtifactError::CategoricalSplit { tree, node });
        }
        let right = raw.right_children[node];
        // Children always sit after their parent, which also rules out cycles.
        for child in [left, right] {
            if child <= node as i64 || child >= n as i64 {
                return Err(ArtifactError::BadChild {
                    tree,
                    node,
                    child,
                    num_nodes: n,
                });
            }
        }
        let feature = raw.split_indices[node];
        if feature < 0 || feature as usize >= num_features {
            return Err(ArtifactError::BadSplitFeature {
                tree,
                node,
                feature,
                num_features,
            });
        }
        nodes.push(Node::Split {
            feature: feature as usize,
            threshold: raw.split_conditions[node],
            left: left as usize,
            right: right as usize,
            default_left: raw.default_left.get(node).copied().unwrap_or(false),
        });
    }
    Ok(Tree { nodes })
}

// XGBoost has written base_score as a number, "5E-1" and "[5E-1]" across releases.
fn scalar_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    scalar_from_value(&value).ok_or_else(|| D::Error::custom(format!("expected a scalar, got {value}")))
}

fn scalar_usize<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    match scalar_from_value(&value) {
        Some(v) if v >= 0.0 && v.fract() == 0.0 => Ok(v as usize),
        _ => Err(D::Error::custom(format!("expected a count, got {value}"))),
    }
}

fn scalar_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let t = s.trim();
            let t = t
                .strip_prefix('[')
                .and_then(|inner| inner.strip_suffix(']'))
                .unwrap_or(t);
            t.trim().parse::<f64>().ok()
        }
        Value::Array(items) => items.first().and_then(scalar_from_value),
        _ => None,
    }
}

fn bool_list<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let items = Vec::<Value>::deserialize(deserializer)?;
    items
        .iter()
        .map(|v| match v {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
            other => Err(D::Error::custom(format!("expected a flag, got {other}"))),
        })
        .collect()
}
