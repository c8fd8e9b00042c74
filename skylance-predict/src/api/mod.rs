//! HTTP API handlers

pub mod health;
pub mod predict;

pub use health::{health_check, health_routes};
pub use predict::{booking_routes, flight_routes, BatchResponse};
