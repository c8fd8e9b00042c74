//! Shared fixtures for integration tests
#![allow(dead_code)]

use skylance_common::db::connect_store;
use skylance_predict::frame::{FeatureFrame, FeatureSchema};
use skylance_predict::pipeline::{bookings, flights, Pipeline, PipelineSpec};
use skylance_predict::scorer::{ScoreKind, Scorer};
use skylance_predict::{AppState, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;

pub const SCHEMA_SQL: &str = include_str!("../fixtures/schema.sql");
pub const SEED_SQL: &str = include_str!("../fixtures/seed.sql");

/// Temporary store file; dropped with the directory
pub struct TestStore {
    pub pool: SqlitePool,
    _dir: TempDir,
}

/// Empty store with the application schema
pub async fn empty_store() -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("skylance.db").display());
    let pool = connect_store(&url).await.unwrap();
    sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await.unwrap();
    TestStore { pool, _dir: dir }
}

/// Schema plus three flights and three bookings, all unscored
pub async fn seeded_store() -> TestStore {
    let store = empty_store().await;
    sqlx::raw_sql(SEED_SQL).execute(&store.pool).await.unwrap();
    store
}

/// Returns a fixed score list regardless of the frame
pub struct FixedScorer {
    pub schema: FeatureSchema,
    pub output: ScoreKind,
    pub scores: Vec<f64>,
}

impl Scorer for FixedScorer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn output(&self) -> ScoreKind {
        self.output
    }

    fn score(&self, _frame: &FeatureFrame) -> Result<Vec<f64>> {
        Ok(self.scores.clone())
    }
}

/// Derives each score from one numeric column, so row alignment is observable
pub struct ColumnScorer {
    pub schema: FeatureSchema,
    pub output: ScoreKind,
    pub column: &'static str,
    pub map: fn(f64) -> f64,
}

impl Scorer for ColumnScorer {
    fn name(&self) -> &str {
        "column"
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn output(&self) -> ScoreKind {
        self.output
    }

    fn score(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        Ok((0..frame.len())
            .map(|i| {
                let v = frame
                    .value(i, self.column)
                    .and_then(|v| v.as_number())
                    .unwrap_or(0.0);
                (self.map)(v)
            })
            .collect())
    }
}

pub fn pipeline_with(spec: PipelineSpec, scorer: impl Scorer + 'static) -> Arc<Pipeline> {
    Arc::new(Pipeline::new(spec, Arc::new(scorer)).unwrap())
}

/// Booking pipeline returning the given labels
pub fn fixed_bookings(scores: Vec<f64>) -> Arc<Pipeline> {
    pipeline_with(
        bookings::spec(),
        FixedScorer {
            schema: bookings::feature_schema(),
            output: ScoreKind::ClassLabel,
            scores,
        },
    )
}

/// Flight pipeline returning the given raw scores
pub fn fixed_flights(scores: Vec<f64>) -> Arc<Pipeline> {
    pipeline_with(
        flights::spec(),
        FixedScorer {
            schema: flights::feature_schema(),
            output: ScoreKind::Value,
            scores,
        },
    )
}

/// Booking label 1 for fares above 250
pub fn price_bookings() -> Arc<Pipeline> {
    pipeline_with(
        bookings::spec(),
        ColumnScorer {
            schema: bookings::feature_schema(),
            output: ScoreKind::ClassLabel,
            column: "Price",
            map: |price| if price > 250.0 { 1.0 } else { 0.0 },
        },
    )
}

/// Flight raw score = distance / 2000
pub fn distance_flights() -> Arc<Pipeline> {
    pipeline_with(
        flights::spec(),
        ColumnScorer {
            schema: flights::feature_schema(),
            output: ScoreKind::Value,
            column: "Distance_km",
            map: |km| km / 2000.0,
        },
    )
}

pub fn app_state(pool: SqlitePool, bookings: Arc<Pipeline>, flights: Arc<Pipeline>) -> AppState {
    AppState::new(pool, bookings, flights)
}

pub async fn booking_prediction(pool: &SqlitePool, id: &str) -> Option<i64> {
    sqlx::query_scalar("SELECT Prediction FROM flightbookingdetails WHERE Id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn flight_probability(pool: &SqlitePool, id: i64) -> Option<f64> {
    sqlx::query_scalar("SELECT Probability FROM flightdetails WHERE Id = ?")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}
