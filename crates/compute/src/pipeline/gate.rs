//! Two-signal alert gate: smoothed hybrid risk confirmed by rule severity.

use tracing::debug;

use triage_core::{Result, TriageError};
use triage_rules::detection_config::AlertGateThresholds;

use crate::window::RollingWindow;

use super::types::{AlertLevel, AlertState, AnomalyScore, SeverityRecord};

pub const REASON_CRITICAL: &str = "Hybrid high risk + rule-confirmed deterioration";
pub const REASON_HIGH: &str = "Hybrid elevated risk + early physiological confirmation";
pub const REASON_SUPPRESSED: &str = "Hybrid risk without physiological confirmation";
pub const REASON_NORMAL: &str = "No sustained risk detected";

/// Stateful gate; evaluate rows strictly in time order.
pub struct AlertGate {
    thresholds: AlertGateThresholds,
    buffer: RollingWindow,
}

impl AlertGate {
    pub fn new(thresholds: &AlertGateThresholds) -> Self {
        Self {
            buffer: RollingWindow::new(thresholds.smoothing_window),
            thresholds: thresholds.clone(),
        }
    }

    pub fn push(&mut self, hybrid_score: f64, anomaly_level: u8) -> AlertState {
        self.buffer.push(Some(hybrid_score));
        let avg_risk = self.buffer.mean_so_far().unwrap_or(hybrid_score);
        let t = &self.thresholds;

        let (final_alert, alert_level, reason) =
            if avg_risk >= t.critical_risk && anomaly_level >= t.critical_min_level {
                (true, AlertLevel::Critical, REASON_CRITICAL)
            } else if avg_risk >= t.high_risk && anomaly_level >= t.high_min_level {
                (true, AlertLevel::High, REASON_HIGH)
            } else if avg_risk >= t.high_risk {
                (false, AlertLevel::Suppressed, REASON_SUPPRESSED)
            } else {
                (false, AlertLevel::Normal, REASON_NORMAL)
            };

        AlertState {
            final_alert,
            alert_level,
            alert_reason: reason.to_string(),
            avg_risk,
        }
    }

    /// Gate a whole batch. Both inputs must align row-for-row.
    pub fn evaluate(
        thresholds: &AlertGateThresholds,
        scores: &[AnomalyScore],
        severity: &[SeverityRecord],
    ) -> Result<Vec<AlertState>> {
        if scores.len() != severity.len() {
            return Err(TriageError::StageMismatch {
                stage: "alert_gate",
                expected: severity.len(),
                actual: scores.len(),
            });
        }
        let mut gate = Self::new(thresholds);
        let states: Vec<AlertState> = scores
            .iter()
            .zip(severity)
            .map(|(a, s)| gate.push(a.hybrid_score, s.anomaly_level))
            .collect();
        debug!(
            rows = states.len(),
            critical = states.iter().filter(|s| s.alert_level == AlertLevel::Critical).count(),
            high = states.iter().filter(|s| s.alert_level == AlertLevel::High).count(),
            suppressed = states.iter().filter(|s| s.alert_level == AlertLevel::Suppressed).count(),
            "alert gate complete"
        );
        Ok(states)
    }
}
