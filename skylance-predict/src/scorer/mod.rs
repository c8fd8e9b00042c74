//! Scorer boundary
//!
//! The pipeline only needs `score(frame) -> one raw score per row, in row order`.
//! [`ScoringArtifact`] is the shipped implementation; anything else implementing
//! [`Scorer`] can be injected instead.

pub mod artifact;

pub use artifact::{load_artifact, ColumnEncoder, Estimator, Node, ScoringArtifact, Task, Tree};

use crate::error::Result;
use crate::frame::{FeatureFrame, FeatureSchema};

/// What the raw scores mean
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Integer class labels carried as f64
    ClassLabel,
    /// Continuous value (regression output or probability)
    Value,
}

/// A loaded, immutable model
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    /// Columns, in order, the model was trained on
    fn schema(&self) -> &FeatureSchema;

    fn output(&self) -> ScoreKind;

    /// One score per frame row, order-preserving
    fn score(&self, frame: &FeatureFrame) -> Result<Vec<f64>>;
}
