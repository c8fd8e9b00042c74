//! Prediction endpoints
//!
//! Each pipeline gets a batch endpoint answering `{"updated": n}` and a single-entity
//! endpoint answering `{"<entity>_id": id, "<value>": v}`. Both mutate the store, so
//! both are POST.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::error;

use crate::error::{ApiError, ApiResult, Error};
use crate::frame::RowKey;
use crate::pipeline::{Pipeline, PipelineSpec, Prediction};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub updated: usize,
}

async fn run_batch(pipeline: &Pipeline, state: &AppState) -> ApiResult<Json<BatchResponse>> {
    let updated = pipeline
        .run_all(&state.db)
        .await
        .map_err(|e| log_failure(pipeline, None, e))?;

    Ok(Json(BatchResponse { updated }))
}

async fn run_single(pipeline: &Pipeline, state: &AppState, raw_id: &str) -> ApiResult<Json<Value>> {
    let key = pipeline.parse_key(raw_id)?;
    let spec = pipeline.spec();

    let prediction = pipeline
        .run_one(&state.db, &key)
        .await
        .map_err(|e| log_failure(pipeline, Some(raw_id), e))?
        .ok_or_else(|| {
            ApiError::NotFound(format!("{} not found or already predicted", spec.entity))
        })?;

    Ok(Json(single_response(spec, &key, prediction)?))
}

/// `{"<id_field>": key, "<value_field>": prediction}`
fn single_response(spec: &PipelineSpec, key: &RowKey, prediction: Prediction) -> ApiResult<Value> {
    let encode = |e: serde_json::Error| {
        ApiError::Internal(format!("Failed to encode {} response: {}", spec.name, e))
    };

    let mut body = Map::new();
    body.insert(
        spec.id_field.to_string(),
        serde_json::to_value(key).map_err(encode)?,
    );
    body.insert(
        spec.value_field.to_string(),
        serde_json::to_value(prediction).map_err(encode)?,
    );
    Ok(Value::Object(body))
}

fn log_failure(pipeline: &Pipeline, id: Option<&str>, err: Error) -> ApiError {
    match id {
        Some(id) => error!(pipeline = pipeline.name(), id, error = ?err, "Prediction failed"),
        None => error!(pipeline = pipeline.name(), error = ?err, "Batch prediction failed"),
    }
    ApiError::Pipeline(err)
}

/// POST /passenger/predict
pub async fn predict_bookings(State(state): State<AppState>) -> ApiResult<Json<BatchResponse>> {
    run_batch(&state.bookings, &state).await
}

/// POST /passenger/predict/:booking_id
pub async fn predict_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> ApiResult<Json<Value>> {
    run_single(&state.bookings, &state, &booking_id).await
}

/// POST /flight/predict_f
pub async fn predict_flights(State(state): State<AppState>) -> ApiResult<Json<BatchResponse>> {
    run_batch(&state.flights, &state).await
}

/// POST /flight/predict_f/:flight_id
pub async fn predict_flight(
    State(state): State<AppState>,
    Path(flight_id): Path<String>,
) -> ApiResult<Json<Value>> {
    run_single(&state.flights, &state, &flight_id).await
}

/// Routes mounted under `/passenger`
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict_bookings))
        .route("/predict/:booking_id", post(predict_booking))
}

/// Routes mounted under `/flight`
pub fn flight_routes() -> Router<AppState> {
    Router::new()
        .route("/predict_f", post(predict_flights))
        .route("/predict_f/:flight_id", post(predict_flight))
}
