//! skylance-predict library
//!
//! Batch scoring of pending bookings and flights: fetch unscored rows, normalize them into
//! the model's feature frame, score, and write the predictions back in one transaction.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod scorer;

pub use error::{ApiError, Error, Result};
pub use pipeline::{Pipeline, PipelineOutcome, Prediction};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub bookings: Arc<Pipeline>,
    pub flights: Arc<Pipeline>,
    /// Startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, bookings: Arc<Pipeline>, flights: Arc<Pipeline>) -> Self {
        Self {
            db,
            bookings,
            flights,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/passenger", api::booking_routes())
        .nest("/flight", api::flight_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
