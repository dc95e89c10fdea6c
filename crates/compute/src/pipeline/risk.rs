//! Final risk fusion: normalized anomaly and trend scores mapped onto a
//! GREEN/AMBER/RED triage level and the terminal alert flag.

use tracing::{debug, warn};

use triage_core::{Result, TriageError};
use triage_rules::scoring_config::{FinalAlertSource, RiskParams};

use super::anomaly::min_max_normalize;
use super::types::{AlertLevel, AlertState, AnomalyScore, DecisionRecord, FeatureVector, RiskLevel};

pub struct RiskScorer {
    params: RiskParams,
}

impl RiskScorer {
    pub fn new(params: &RiskParams) -> Self {
        Self { params: params.clone() }
    }

    /// Mean absolute slope over the configured trend columns a row carries.
    pub fn trend_severity(&self, f: &FeatureVector) -> f64 {
        let slopes: Vec<f64> = self
            .params
            .trend_features
            .iter()
            .filter_map(|c| f.feature(c))
            .map(f64::abs)
            .collect();
        if slopes.is_empty() {
            0.0
        } else {
            slopes.iter().sum::<f64>() / slopes.len() as f64
        }
    }

    fn validated(&self, score: &AnomalyScore, gate: &AlertState) -> bool {
        match self.params.final_alert_source {
            FinalAlertSource::HybridAnomaly => score.hybrid_anomaly,
            FinalAlertSource::Gate => matches!(gate.alert_level, AlertLevel::High | AlertLevel::Critical),
        }
    }

    /// Score the whole batch. All three inputs must align row-for-row.
    pub fn score_batch(
        &self,
        features: &[FeatureVector],
        scores: &[AnomalyScore],
        gates: &[AlertState],
    ) -> Result<Vec<DecisionRecord>> {
        for (stage, actual) in [("risk_scorer.anomaly", scores.len()), ("risk_scorer.gate", gates.len())] {
            if actual != features.len() {
                return Err(TriageError::StageMismatch {
                    stage,
                    expected: features.len(),
                    actual,
                });
            }
        }

        let known = self
            .params
            .trend_features
            .iter()
            .filter(|c| features.first().is_some_and(|f| f.feature(c).is_some()))
            .count();
        if known < self.params.trend_features.len() {
            warn!(
                configured = self.params.trend_features.len(),
                available = known,
                "some trend features are not available; averaging the rest"
            );
        }

        let eps = self.params.normalization_epsilon;
        let trend: Vec<f64> = features.iter().map(|f| self.trend_severity(f)).collect();
        let hybrid: Vec<f64> = scores.iter().map(|s| s.hybrid_score).collect();
        let anomaly_norm: Vec<f64> = min_max_normalize(&hybrid, eps).into_iter().map(|v| v * 100.0).collect();
        let trend_norm: Vec<f64> = min_max_normalize(&trend, eps).into_iter().map(|v| v * 100.0).collect();

        let w = &self.params.weights;
        let cw = &self.params.confidence_weights;
        let records: Vec<DecisionRecord> = features
            .iter()
            .enumerate()
            .map(|(i, f)| {
                let (a, t) = (anomaly_norm[i], trend_norm[i]);
                let confidence = (cw.anomaly * a + cw.trend * t) / 100.0;
                let risk_score = w.anomaly * a + w.trend * t + w.confidence * confidence * 100.0;
                let risk_level = RiskLevel::from_score(
                    risk_score,
                    self.params.amber_threshold,
                    self.params.red_threshold,
                );
                DecisionRecord {
                    time_sec: f.time_sec,
                    trend_severity: trend[i],
                    anomaly_norm: a,
                    trend_norm: t,
                    confidence,
                    risk_score,
                    risk_level,
                    final_alert_flag: self.validated(&scores[i], &gates[i]) && risk_level == RiskLevel::Red,
                }
            })
            .collect();

        debug!(
            rows = records.len(),
            red = records.iter().filter(|r| r.risk_level == RiskLevel::Red).count(),
            amber = records.iter().filter(|r| r.risk_level == RiskLevel::Amber).count(),
            final_alerts = records.iter().filter(|r| r.final_alert_flag).count(),
            "risk scoring complete"
        );
        Ok(records)
    }
}
