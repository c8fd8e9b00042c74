//! Generic fetch → normalize → score → writeback pipeline
//!
//! A [`PipelineSpec`] holds everything that differs between the booking and flight
//! pipelines: the join query, remap and default rules, the feature schema, the value
//! transform and the target table. [`Pipeline`] pairs a spec with a loaded scorer and
//! runs invocations against a store pool.
//!
//! Invocations on one `Pipeline` are serialized by an async mutex. Across processes
//! nothing is locked; writeback only fills still-empty prediction cells, so the first
//! committed write wins.

pub mod bookings;
pub mod fetch;
pub mod flights;
pub mod normalize;
pub mod writeback;

use crate::error::{Error, Result};
use crate::frame::{FeatureSchema, FeatureValue, KeyKind, RowKey};
use crate::scorer::{ScoreKind, Scorer};
use serde::Serialize;
use skylance_common::db::{ColumnDefinition, TableSchema};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Table that owns the prediction column
#[derive(Debug, Clone)]
pub struct TargetTable {
    pub table: &'static str,
    pub key_column: &'static str,
    pub key_kind: KeyKind,
    pub prediction_column: &'static str,
    /// Declared SQL type of the prediction column
    pub prediction_type: &'static str,
}

impl TargetTable {
    /// Columns this service relies on: key as primary key, nullable prediction column
    pub fn table_schema(&self) -> TableSchema {
        TableSchema::new(self.table)
            .column(ColumnDefinition::new(self.key_column, self.key_kind.sql_type()).primary_key())
            .column(ColumnDefinition::new(self.prediction_column, self.prediction_type).nullable())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemapMode {
    /// Unlisted values become missing
    Map,
    /// Unlisted values pass through
    Replace,
}

/// Code → label rewrite for one fetched column
#[derive(Debug, Clone)]
pub struct Remap {
    pub column: &'static str,
    pub mode: RemapMode,
    pub rules: Vec<(FeatureValue, FeatureValue)>,
}

impl Remap {
    pub fn map(column: &'static str, rules: Vec<(FeatureValue, FeatureValue)>) -> Self {
        Self {
            column,
            mode: RemapMode::Map,
            rules,
        }
    }

    pub fn replace(column: &'static str, rules: Vec<(FeatureValue, FeatureValue)>) -> Self {
        Self {
            column,
            mode: RemapMode::Replace,
            rules,
        }
    }

    pub fn apply(&self, value: &FeatureValue) -> FeatureValue {
        if value.is_missing() {
            return FeatureValue::Missing;
        }
        match self.rules.iter().find(|(code, _)| code == value) {
            Some((_, label)) => label.clone(),
            None if self.mode == RemapMode::Replace => value.clone(),
            None => FeatureValue::Missing,
        }
    }
}

/// Conversion from raw scorer output to the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueTransform {
    /// Integer class label, stored unchanged
    ClassLabel,
    /// Raw score `s` in [0, 1] stored as `round((1 - s) * 100, 2)`
    ShowProbabilityPercent,
}

impl ValueTransform {
    /// Scorer output this transform accepts
    pub fn expected_output(&self) -> ScoreKind {
        match self {
            ValueTransform::ClassLabel => ScoreKind::ClassLabel,
            ValueTransform::ShowProbabilityPercent => ScoreKind::Value,
        }
    }

    pub fn apply(&self, raw: f64) -> Result<Prediction> {
        if !raw.is_finite() {
            return Err(Error::Scorer(format!("non-finite score {}", raw)));
        }

        match self {
            ValueTransform::ClassLabel => {
                if raw.fract() != 0.0 {
                    return Err(Error::Scorer(format!("score {} is not a class label", raw)));
                }
                Ok(Prediction::Label(raw as i64))
            }
            ValueTransform::ShowProbabilityPercent => {
                let clamped = raw.clamp(0.0, 1.0);
                if clamped != raw {
                    warn!(raw, clamped, "Score outside [0, 1], clamped");
                }
                let percent = ((1.0 - clamped) * 100.0 * 100.0).round() / 100.0;
                Ok(Prediction::Probability(percent))
            }
        }
    }
}

/// Value written to the prediction column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prediction {
    Label(i64),
    Probability(f64),
}

/// Static description of one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Short name used in logs and the run-once CLI
    pub name: &'static str,
    /// Entity label for messages, e.g. "Booking"
    pub entity: &'static str,
    /// JSON field names of single-entity responses
    pub id_field: &'static str,
    pub value_field: &'static str,
    pub target: TargetTable,
    /// Join query ending in the `IS NULL` predicate; filters and ordering are appended
    pub select_sql: &'static str,
    /// Qualified key expression usable in `WHERE` / `ORDER BY`
    pub key_expr: &'static str,
    /// Result alias of the key column
    pub key_alias: &'static str,
    pub remaps: Vec<Remap>,
    /// Fixed placeholder values; overwrite whatever was fetched
    pub defaults: Vec<(&'static str, FeatureValue)>,
    pub schema: FeatureSchema,
    pub transform: ValueTransform,
}

/// Result of one invocation
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Unfiltered run: rows changed by this invocation
    Updated(usize),
    /// Single-entity run: the value written
    Scored(Prediction),
    /// Single-entity run found nothing to score
    NotFound,
}

pub struct Pipeline {
    spec: PipelineSpec,
    scorer: Arc<dyn Scorer>,
    run_lock: Mutex<()>,
}

impl Pipeline {
    /// Pair a spec with a scorer; rejects a scorer trained on other features
    pub fn new(spec: PipelineSpec, scorer: Arc<dyn Scorer>) -> Result<Self> {
        if let Some(diff) = scorer.schema().first_difference(&spec.schema) {
            return Err(Error::Config(format!(
                "Scorer '{}' does not match the {} feature schema: {}",
                scorer.name(),
                spec.name,
                diff
            )));
        }

        let expected = spec.transform.expected_output();
        if scorer.output() != expected {
            return Err(Error::Config(format!(
                "Scorer '{}' produces {:?} output, {} pipeline needs {:?}",
                scorer.name(),
                scorer.output(),
                spec.name,
                expected
            )));
        }

        Ok(Self {
            spec,
            scorer,
            run_lock: Mutex::new(()),
        })
    }

    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// Parse an external id into the target's key type
    pub fn parse_key(&self, raw: &str) -> Result<RowKey> {
        self.spec
            .target
            .key_kind
            .parse(raw)
            .ok_or_else(|| Error::InvalidKey {
                entity: self.spec.entity.to_lowercase(),
                value: raw.to_string(),
            })
    }

    /// Startup checks against the live store
    ///
    /// The target table must carry the declared key and prediction columns, and the join
    /// query together with the defaults must supply every feature the scorer reads.
    pub async fn verify_store(&self, pool: &SqlitePool) -> Result<()> {
        self.spec.target.table_schema().verify(pool).await?;

        let columns = fetch::result_columns(pool, &self.spec).await?;
        normalize::check_feature_sources(&self.spec, &columns)?;
        Ok(())
    }

    /// Score all unscored rows, or just `key`
    pub async fn run(&self, pool: &SqlitePool, key: Option<&RowKey>) -> Result<PipelineOutcome> {
        let _guard = self.run_lock.lock().await;
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let pipeline = self.spec.name;

        let batch = fetch::fetch_batch(pool, &self.spec, key).await?;
        if batch.is_empty() {
            debug!(pipeline, %run_id, key = ?key, "Nothing to score");
            return Ok(match key {
                Some(_) => PipelineOutcome::NotFound,
                None => PipelineOutcome::Updated(0),
            });
        }

        let frame = normalize::normalize_batch(&self.spec, &batch.rows)?;
        let scores = self.scorer.score(&frame)?;
        if scores.len() != frame.len() {
            return Err(Error::Scorer(format!(
                "scorer '{}' returned {} scores for {} rows",
                self.scorer.name(),
                scores.len(),
                frame.len()
            )));
        }

        let predictions = scores
            .iter()
            .map(|s| self.spec.transform.apply(*s))
            .collect::<Result<Vec<_>>>()?;

        let updated =
            writeback::commit_predictions(pool, &self.spec.target, &batch.keys, &predictions)
                .await?;

        info!(
            pipeline,
            %run_id,
            rows = batch.len(),
            updated,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Pipeline run complete"
        );

        Ok(match key {
            // Written by a concurrent invocation between our fetch and commit
            Some(_) if updated == 0 => PipelineOutcome::NotFound,
            Some(_) => PipelineOutcome::Scored(predictions[0]),
            None => PipelineOutcome::Updated(updated),
        })
    }

    /// Unfiltered run; returns the number of rows updated
    pub async fn run_all(&self, pool: &SqlitePool) -> Result<usize> {
        match self.run(pool, None).await? {
            PipelineOutcome::Updated(n) => Ok(n),
            _ => Ok(0),
        }
    }

    /// Single-entity run; `None` when the row is absent or already scored
    pub async fn run_one(&self, pool: &SqlitePool, key: &RowKey) -> Result<Option<Prediction>> {
        match self.run(pool, Some(key)).await? {
            PipelineOutcome::Scored(p) => Ok(Some(p)),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FeatureColumn, FeatureFrame};

    struct ConstScorer {
        schema: FeatureSchema,
        output: ScoreKind,
    }

    impl Scorer for ConstScorer {
        fn name(&self) -> &str {
            "const"
        }
        fn schema(&self) -> &FeatureSchema {
            &self.schema
        }
        fn output(&self) -> ScoreKind {
            self.output
        }
        fn score(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
            Ok(vec![0.0; frame.len()])
        }
    }

    #[test]
    fn test_percent_transform() {
        let t = ValueTransform::ShowProbabilityPercent;
        assert_eq!(t.apply(0.82).unwrap(), Prediction::Probability(18.0));
        assert_eq!(t.apply(0.1234).unwrap(), Prediction::Probability(87.66));
        assert_eq!(t.apply(0.0).unwrap(), Prediction::Probability(100.0));
        assert_eq!(t.apply(1.0).unwrap(), Prediction::Probability(0.0));
        // clamped into range
        assert_eq!(t.apply(1.3).unwrap(), Prediction::Probability(0.0));
        assert_eq!(t.apply(-0.2).unwrap(), Prediction::Probability(100.0));
        assert!(t.apply(f64::NAN).is_err());
    }

    #[test]
    fn test_class_label_transform() {
        let t = ValueTransform::ClassLabel;
        assert_eq!(t.apply(1.0).unwrap(), Prediction::Label(1));
        assert_eq!(t.apply(0.0).unwrap(), Prediction::Label(0));
        assert!(matches!(t.apply(0.7), Err(Error::Scorer(_))));
    }

    #[test]
    fn test_prediction_serializes_bare() {
        assert_eq!(serde_json::to_string(&Prediction::Label(1)).unwrap(), "1");
        assert_eq!(
            serde_json::to_string(&Prediction::Probability(18.0)).unwrap(),
            "18.0"
        );
    }

    #[test]
    fn test_remap_modes() {
        let gender = Remap::map("Gender", vec![("M".into(), "Male".into())]);
        assert_eq!(gender.apply(&"M".into()), "Male".into());
        assert_eq!(gender.apply(&"X".into()), FeatureValue::Missing);

        let tier = Remap::replace("MembershipTier", vec![("Normal".into(), "None".into())]);
        assert_eq!(tier.apply(&"Normal".into()), "None".into());
        assert_eq!(tier.apply(&"Gold".into()), "Gold".into());
        assert_eq!(tier.apply(&FeatureValue::Missing), FeatureValue::Missing);
    }

    #[test]
    fn test_new_rejects_mismatched_scorer() {
        let wrong_columns = ConstScorer {
            schema: FeatureSchema::new(vec![FeatureColumn::numeric("Distance_km")]),
            output: ScoreKind::Value,
        };
        let result = Pipeline::new(flights::spec(), Arc::new(wrong_columns));
        assert!(matches!(result, Err(Error::Config(_))));

        let wrong_output = ConstScorer {
            schema: flights::spec().schema,
            output: ScoreKind::ClassLabel,
        };
        let result = Pipeline::new(flights::spec(), Arc::new(wrong_output));
        assert!(matches!(result, Err(Error::Config(_))));

        let matching = ConstScorer {
            schema: flights::spec().schema,
            output: ScoreKind::Value,
        };
        assert!(Pipeline::new(flights::spec(), Arc::new(matching)).is_ok());
    }

    #[test]
    fn test_parse_key_by_target_type() {
        let scorer = ConstScorer {
            schema: flights::spec().schema,
            output: ScoreKind::Value,
        };
        let pipeline = Pipeline::new(flights::spec(), Arc::new(scorer)).unwrap();

        assert_eq!(pipeline.parse_key("42").unwrap(), RowKey::Integer(42));
        assert!(matches!(
            pipeline.parse_key("abc"),
            Err(Error::InvalidKey { .. })
        ));
    }
}
