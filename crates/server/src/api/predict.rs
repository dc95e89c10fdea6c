//! Single-sample real-time assessment.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::debug;

use triage_compute::{RealtimeAssessment, RealtimeVitals};

use crate::state::AppState;

/// `POST /predict {heart_rate_bpm, spo2_percent}`. Malformed bodies are
/// rejected by the JSON extractor before reaching the scorer.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(vitals): Json<RealtimeVitals>,
) -> Json<RealtimeAssessment> {
    let assessment = state.scorer.assess(vitals);
    debug!(
        heart_rate_bpm = vitals.heart_rate_bpm,
        spo2_percent = vitals.spo2_percent,
        risk_score = assessment.risk_score,
        risk_level = %assessment.risk_level,
        "predict"
    );
    Json(assessment)
}
