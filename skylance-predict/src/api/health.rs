//! Health check endpoint
//!
//! Reports store reachability and the scorer behind each pipeline. Pipelines only
//! exist in the state once their startup checks passed.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::pipeline::Pipeline;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the store does not answer
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store_reachable: bool,
    pub pipelines: Vec<PipelineStatus>,
}

#[derive(Debug, Serialize)]
pub struct PipelineStatus {
    pub name: String,
    pub scorer: String,
    /// `table.column` receiving predictions
    pub target: String,
    pub features: usize,
}

impl PipelineStatus {
    fn of(pipeline: &Pipeline) -> Self {
        let target = &pipeline.spec().target;
        Self {
            name: pipeline.name().to_string(),
            scorer: pipeline.scorer_name().to_string(),
            target: format!("{}.{}", target.table, target.prediction_column),
            features: pipeline.spec().schema.len(),
        }
    }
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_reachable = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "Health check: store unreachable");
            false
        }
    };
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" }.to_string(),
        module: "skylance-predict".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        store_reachable,
        pipelines: vec![
            PipelineStatus::of(&state.bookings),
            PipelineStatus::of(&state.flights),
        ],
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
