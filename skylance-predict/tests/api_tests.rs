//! Integration tests for the HTTP endpoints
//!
//! Requests go through the full router (`oneshot`) against a temporary seeded store.

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use helpers::*;
use serde_json::{json, Value};
use skylance_predict::build_router;
use tower::util::ServiceExt; // for `oneshot`

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

#[tokio::test]
async fn test_health_endpoint() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![]),
        fixed_flights(vec![]),
    ));

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "skylance-predict");
    assert!(body["uptime_seconds"].is_u64());
    assert_eq!(body["store_reachable"], true);
    assert_eq!(
        body["pipelines"],
        json!([
            {"name": "bookings", "scorer": "fixed", "target": "flightbookingdetails.Prediction", "features": 20},
            {"name": "flights", "scorer": "fixed", "target": "flightdetails.Probability", "features": 14}
        ])
    );
}

#[tokio::test]
async fn test_health_reports_degraded_store() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![]),
        fixed_flights(vec![]),
    ));
    store.pool.close().await;

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store_reachable"], false);
}

#[tokio::test]
async fn test_booking_batch_then_nothing_left() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![1.0, 0.0, 1.0]),
        fixed_flights(vec![]),
    ));

    let response = app.clone().oneshot(post("/passenger/predict")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!({"updated": 3}));

    let response = app.oneshot(post("/passenger/predict")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!({"updated": 0}));

    assert_eq!(booking_prediction(&store.pool, "BK-1002").await, Some(0));
}

#[tokio::test]
async fn test_single_booking() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        price_bookings(),
        fixed_flights(vec![]),
    ));

    let response = app
        .clone()
        .oneshot(post("/passenger/predict/BK-1002"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        extract_json(response.into_body()).await,
        json!({"booking_id": "BK-1002", "prediction": 1})
    );

    let response = app
        .oneshot(post("/passenger/predict/BK-1002"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(
        body["error"]["message"],
        "Booking not found or already predicted"
    );
}

#[tokio::test]
async fn test_single_flight_probability() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![]),
        fixed_flights(vec![0.82]),
    ));

    let response = app.oneshot(post("/flight/predict_f/1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        extract_json(response.into_body()).await,
        json!({"flight_id": 1, "probability": 18.0})
    );
    assert_eq!(flight_probability(&store.pool, 1).await, Some(18.0));
}

#[tokio::test]
async fn test_flight_batch() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![]),
        distance_flights(),
    ));

    let response = app.oneshot(post("/flight/predict_f")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_json(response.into_body()).await, json!({"updated": 3}));
    assert_eq!(flight_probability(&store.pool, 3).await, Some(40.0));
}

#[tokio::test]
async fn test_unknown_flight_is_not_found() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![]),
        distance_flights(),
    ));

    let response = app.oneshot(post("/flight/predict_f/999")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = extract_json(response.into_body()).await;
    assert_eq!(
        body["error"]["message"],
        "Flight not found or already predicted"
    );
}

#[tokio::test]
async fn test_non_numeric_flight_id_is_bad_request() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![]),
        distance_flights(),
    ));

    let response = app.oneshot(post("/flight/predict_f/abc")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_pipeline_failure_is_server_error() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        // two labels for three pending rows
        fixed_bookings(vec![1.0, 0.0]),
        fixed_flights(vec![]),
    ));

    let response = app.oneshot(post("/passenger/predict")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("2 scores for 3 rows"));
    assert_eq!(booking_prediction(&store.pool, "BK-1001").await, None);
}

#[tokio::test]
async fn test_get_on_predict_is_rejected() {
    let store = seeded_store().await;
    let app = build_router(app_state(
        store.pool.clone(),
        fixed_bookings(vec![1.0, 0.0, 1.0]),
        fixed_flights(vec![]),
    ));

    let request = Request::builder()
        .uri("/passenger/predict")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(booking_prediction(&store.pool, "BK-1001").await, None);
}
