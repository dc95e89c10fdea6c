//! Single-sample real-time scorer.
//!
//! A stateless, additive threshold score over heart rate and SpO2. Its alert
//! policy differs from the batch risk scorer on purpose: any AMBER or RED
//! level raises `anomaly_flag` here, while the batch path raises its terminal
//! flag only on a validated RED.

use serde::{Deserialize, Serialize};

use triage_rules::scoring_config::RealtimeParams;

use crate::pipeline::types::RiskLevel;

/// Point-in-time vitals accepted by the real-time scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealtimeVitals {
    pub heart_rate_bpm: f64,
    pub spo2_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RealtimeAssessment {
    pub anomaly_flag: u8,
    /// Rounded to two decimals.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Rounded to two decimals.
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct RealtimeScorer {
    params: RealtimeParams,
}

impl RealtimeScorer {
    pub fn new(params: &RealtimeParams) -> Self {
        Self { params: params.clone() }
    }

    /// Unrounded risk in `[0, max_risk]`.
    pub fn risk(&self, heart_rate_bpm: f64, spo2_percent: f64) -> f64 {
        let p = &self.params;
        (p.heart_rate.above(heart_rate_bpm) + p.spo2.below(spo2_percent)).min(p.max_risk)
    }

    /// Total over all finite inputs; never fails.
    pub fn assess(&self, vitals: RealtimeVitals) -> RealtimeAssessment {
        let p = &self.params;
        let risk = self.risk(vitals.heart_rate_bpm, vitals.spo2_percent);
        let risk_level = RiskLevel::from_score(risk, p.amber_threshold, p.red_threshold);
        let confidence = round2((p.confidence.base + risk / p.confidence.divisor).min(p.confidence.max));
        RealtimeAssessment {
            anomaly_flag: u8::from(risk_level != RiskLevel::Green),
            risk_score: round2(risk),
            risk_level,
            confidence,
        }
    }
}

impl Default for RealtimeScorer {
    fn default() -> Self {
        Self::new(&triage_rules::scoring_config::ScoringConfigSpec::default().realtime)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assess(hr: f64, spo2: f64) -> RealtimeAssessment {
        RealtimeScorer::default().assess(RealtimeVitals {
            heart_rate_bpm: hr,
            spo2_percent: spo2,
        })
    }

    #[test]
    fn tachycardia_with_desaturation_is_amber() {
        let a = assess(120.0, 88.0);
        assert_eq!(a.risk_score, 46.0);
        assert_eq!(a.risk_level, RiskLevel::Amber);
        assert_eq!(a.anomaly_flag, 1);
        assert_eq!(a.confidence, 0.73);
    }

    #[test]
    fn normal_vitals_are_green() {
        let a = assess(80.0, 97.0);
        assert_eq!(a.risk_score, 0.0);
        assert_eq!(a.risk_level, RiskLevel::Green);
        assert_eq!(a.anomaly_flag, 0);
        assert_eq!(a.confidence, 0.5);
    }

    #[test]
    fn contributions_cap_and_total_caps() {
        // 30 + 50 = 80, RED.
        let a = assess(250.0, 10.0);
        assert_eq!(a.risk_score, 80.0);
        assert_eq!(a.risk_level, RiskLevel::Red);
        assert_eq!(a.confidence, 0.9);
    }

    #[test]
    fn thresholds_are_exclusive_at_the_boundary() {
        assert_eq!(assess(100.0, 94.0).risk_score, 0.0);
        assert_eq!(assess(100.0, 85.0).risk_score, 45.0);
        assert_eq!(assess(100.0, 85.0).risk_level, RiskLevel::Amber);
        // SpO2 alone caps at 50, short of RED.
        assert_eq!(assess(100.0, 82.0).risk_level, RiskLevel::Amber);
        assert_eq!(assess(113.0, 84.0).risk_score, 60.4);
        assert_eq!(assess(113.0, 84.0).risk_level, RiskLevel::Red);
    }

    #[test]
    fn confidence_is_clipped() {
        let mut params = triage_rules::scoring_config::ScoringConfigSpec::default().realtime;
        params.max_risk = 1000.0;
        params.spo2.max_points = 1000.0;
        let a = RealtimeScorer::new(&params).assess(RealtimeVitals {
            heart_rate_bpm: 80.0,
            spo2_percent: 0.0,
        });
        assert_eq!(a.confidence, 0.99);
    }

    #[test]
    fn assessment_serializes_with_level_label() {
        let json = serde_json::to_value(assess(120.0, 88.0)).unwrap();
        assert_eq!(json["risk_level"], "AMBER");
        assert_eq!(json["anomaly_flag"], 1);
    }
}
