//! JSON scoring artifact
//!
//! An exported preprocessing + estimator pipeline:
//!
//! ```json
//! {
//!   "name": "flight_no_show_pipeline",
//!   "features": [{"name": "Distance_km", "kind": "numeric"}, ...],
//!   "encoders": [{"type": "standardize", "mean": 1200.0, "scale": 800.0}, ...],
//!   "estimator": {"type": "linear", "task": "regressor", "coefficients": [...], "intercept": 0.1}
//! }
//! ```
//!
//! Each feature is encoded by its encoder into one slot (numeric) or one slot per known
//! category (one-hot; unknown and missing labels encode as all zeros). The estimator
//! reads the concatenated vector. Tree splits send `x <= threshold` left.
//!
//! Everything is validated at load so scoring itself cannot index out of bounds.

use super::{ScoreKind, Scorer};
use crate::error::{Error, Result};
use crate::frame::{FeatureFrame, FeatureKind, FeatureSchema, FeatureValue};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Per-feature encoding step
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColumnEncoder {
    /// Numeric value as is; missing becomes `fill`
    Passthrough {
        #[serde(default)]
        fill: f64,
    },
    /// `(x - mean) / scale`; missing is imputed with `fill` before scaling
    Standardize {
        mean: f64,
        scale: f64,
        #[serde(default)]
        fill: f64,
    },
    OneHot { categories: Vec<String> },
}

impl ColumnEncoder {
    fn kind(&self) -> FeatureKind {
        match self {
            ColumnEncoder::OneHot { .. } => FeatureKind::Categorical,
            _ => FeatureKind::Numeric,
        }
    }

    fn width(&self) -> usize {
        match self {
            ColumnEncoder::OneHot { categories } => categories.len(),
            _ => 1,
        }
    }

    fn encode(&self, value: &FeatureValue, out: &mut Vec<f64>) {
        match self {
            ColumnEncoder::Passthrough { fill } => out.push(value.as_number().unwrap_or(*fill)),
            ColumnEncoder::Standardize { mean, scale, fill } => {
                let x = value.as_number().unwrap_or(*fill);
                out.push((x - mean) / scale);
            }
            ColumnEncoder::OneHot { categories } => {
                let label = value.as_text();
                out.extend(
                    categories
                        .iter()
                        .map(|c| if Some(c.as_str()) == label { 1.0 } else { 0.0 }),
                );
            }
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self {
            ColumnEncoder::Passthrough { fill } if !fill.is_finite() => {
                Err("passthrough fill must be finite".to_string())
            }
            ColumnEncoder::Standardize { mean, scale, fill } => {
                if !mean.is_finite() || !fill.is_finite() {
                    Err("standardize mean and fill must be finite".to_string())
                } else if !scale.is_finite() || *scale == 0.0 {
                    Err("standardize scale must be finite and non-zero".to_string())
                } else {
                    Ok(())
                }
            }
            ColumnEncoder::OneHot { categories } => {
                let unique: HashSet<&String> = categories.iter().collect();
                if categories.is_empty() {
                    Err("one_hot needs at least one category".to_string())
                } else if unique.len() != categories.len() {
                    Err("one_hot categories must be unique".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Classifier,
    Regressor,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution (classifier) or single value (regressor)
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root to a leaf
    fn leaf(&self, x: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[*feature] <= *threshold { *left } else { *right },
                Node::Leaf { value } => return value,
            }
        }
    }

    fn validate(&self, width: usize, leaf_width: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= width {
                        return Err(format!(
                            "node {} splits on slot {}, encoded width is {}",
                            i, feature, width
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", i));
                    }
                    // Children after parents guarantees every walk ends at a leaf
                    for child in [left, right] {
                        if *child <= i || *child >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                    }
                }
                Node::Leaf { value } if value.len() != leaf_width => {
                    return Err(format!(
                        "leaf {} has {} values, expected {}",
                        i,
                        value.len(),
                        leaf_width
                    ));
                }
                Node::Leaf { .. } => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    /// Linear model; classifiers pick `classes[1]` when the margin is positive
    Linear {
        task: Task,
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        classes: Vec<i64>,
    },
    /// Tree ensemble; classifiers average leaf distributions, regressors leaf values
    Forest {
        task: Task,
        trees: Vec<Tree>,
        #[serde(default)]
        classes: Vec<i64>,
    },
}

impl Estimator {
    fn task(&self) -> Task {
        match self {
            Estimator::Linear { task, .. } | Estimator::Forest { task, .. } => *task,
        }
    }

    fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Estimator::Linear {
                task,
                coefficients,
                intercept,
                classes,
            } => {
                let margin: f64 =
                    coefficients.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + intercept;
                match task {
                    Task::Regressor => margin,
                    Task::Classifier if margin > 0.0 => classes[1] as f64,
                    Task::Classifier => classes[0] as f64,
                }
            }
            Estimator::Forest {
                task,
                trees,
                classes,
            } => {
                let n = trees.len() as f64;
                match task {
                    Task::Regressor => trees.iter().map(|t| t.leaf(x)[0]).sum::<f64>() / n,
                    Task::Classifier => {
                        let mut votes = vec![0.0; classes.len()];
                        for tree in trees {
                            for (acc, p) in votes.iter_mut().zip(tree.leaf(x)) {
                                *acc += p;
                            }
                        }
                        // First maximum wins ties
                        let mut best = 0;
                        for (i, v) in votes.iter().enumerate() {
                            if *v > votes[best] {
                                best = i;
                            }
                        }
                        classes[best] as f64
                    }
                }
            }
        }
    }

    fn validate(&self, width: usize) -> std::result::Result<(), String> {
        match self {
            Estimator::Linear {
                task,
                coefficients,
                intercept,
                classes,
            } => {
                if coefficients.len() != width {
                    return Err(format!(
                        "linear model has {} coefficients, encoded width is {}",
                        coefficients.len(),
                        width
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|w| !w.is_finite()) {
                    return Err("linear model weights must be finite".to_string());
                }
                if *task == Task::Classifier && classes.len() != 2 {
                    return Err("linear classifier needs exactly two classes".to_string());
                }
                Ok(())
            }
            Estimator::Forest {
                task,
                trees,
                classes,
            } => {
                if trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                let leaf_width = match task {
                    Task::Classifier if classes.is_empty() => {
                        return Err("forest classifier needs classes".to_string())
                    }
                    Task::Classifier => classes.len(),
                    Task::Regressor => 1,
                };
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(width, leaf_width)
                        .map_err(|e| format!("tree {}: {}", i, e))?;
                }
                Ok(())
            }
        }
    }
}

/// Deserialized, validated scoring pipeline
#[derive(Debug, Clone)]
pub struct ScoringArtifact {
    name: String,
    features: FeatureSchema,
    encoders: Vec<ColumnEncoder>,
    estimator: Estimator,
    width: usize,
}

#[derive(Deserialize)]
struct ArtifactFile {
    name: String,
    features: FeatureSchema,
    encoders: Vec<ColumnEncoder>,
    estimator: Estimator,
}

impl ScoringArtifact {
    /// Parse and validate an artifact document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ArtifactFile = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Malformed scorer artifact: {}", e)))?;

        let invalid = |msg: String| Error::Config(format!("Scorer artifact '{}': {}", file.name, msg));

        if file.features.is_empty() {
            return Err(invalid("no features declared".to_string()));
        }
        if file.encoders.len() != file.features.len() {
            return Err(invalid(format!(
                "{} encoders for {} features",
                file.encoders.len(),
                file.features.len()
            )));
        }
        for (column, encoder) in file.features.columns().iter().zip(&file.encoders) {
            if encoder.kind() != column.kind {
                return Err(invalid(format!(
                    "encoder for {} handles {:?} values, feature is {:?}",
                    column.name,
                    encoder.kind(),
                    column.kind
                )));
            }
            encoder
                .validate()
                .map_err(|e| invalid(format!("{}: {}", column.name, e)))?;
        }

        let width = file.encoders.iter().map(ColumnEncoder::width).sum();
        file.estimator.validate(width).map_err(&invalid)?;

        Ok(Self {
            name: file.name,
            features: file.features,
            encoders: file.encoders,
            estimator: file.estimator,
            width,
        })
    }

    /// Length of the encoded feature vector
    pub fn encoded_width(&self) -> usize {
        self.width
    }

    /// Encode one frame row
    pub fn encode_row(&self, row: &[FeatureValue]) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.width);
        for (encoder, value) in self.encoders.iter().zip(row) {
            encoder.encode(value, &mut x);
        }
        x
    }
}

impl Scorer for ScoringArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &FeatureSchema {
        &self.features
    }

    fn output(&self) -> ScoreKind {
        match self.estimator.task() {
            Task::Classifier => ScoreKind::ClassLabel,
            Task::Regressor => ScoreKind::Value,
        }
    }

    fn score(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        if let Some(diff) = self.features.first_difference(frame.schema()) {
            return Err(Error::Scorer(format!(
                "frame does not match '{}' features: {}",
                self.name, diff
            )));
        }

        Ok(frame
            .rows()
            .iter()
            .map(|row| self.estimator.predict(&self.encode_row(row)))
            .collect())
    }
}

/// Load a scorer artifact from disk; any failure is a configuration fault
pub fn load_artifact(path: &Path) -> Result<ScoringArtifact> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read scorer artifact {}: {}",
            path.display(),
            e
        ))
    })?;
    let artifact = ScoringArtifact::from_json(&json)?;

    info!(
        artifact = %artifact.name,
        path = %path.display(),
        features = artifact.features.len(),
        encoded_width = artifact.width,
        "Loaded scorer artifact"
    );
    Ok(artifact)
}
