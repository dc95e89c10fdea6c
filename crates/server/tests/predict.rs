use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use triage_compute::RealtimeScorer;
use triage_server::api::HealthResponse;
use triage_server::{build_router, AppState};

fn app() -> Router {
    build_router(Arc::new(AppState::new(RealtimeScorer::default(), "test")), "*")
}

async fn post_predict(body: &str) -> (StatusCode, Vec<u8>) {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, bytes)
}

#[tokio::test]
async fn predict_amber_reading() {
    let (status, body) = post_predict(r#"{"heart_rate_bpm": 120, "spo2_percent": 88}"#).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["anomaly_flag"], 1);
    assert_eq!(json["risk_score"], 46.0);
    assert_eq!(json["risk_level"], "AMBER");
    assert_eq!(json["confidence"], 0.73);
}

#[tokio::test]
async fn predict_normal_reading() {
    let (status, body) = post_predict(r#"{"heart_rate_bpm": 80, "spo2_percent": 97}"#).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["anomaly_flag"], 0);
    assert_eq!(json["risk_score"], 0.0);
    assert_eq!(json["risk_level"], "GREEN");
    assert_eq!(json["confidence"], 0.5);
}

#[tokio::test]
async fn predict_rejects_missing_field() {
    let (status, _) = post_predict(r#"{"heart_rate_bpm": 80}"#).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn health_reports_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.profile, "test");
}
