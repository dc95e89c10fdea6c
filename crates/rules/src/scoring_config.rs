//! ScoringConfig rule kind: unsupervised anomaly estimators, hybrid score
//! weights, final risk fusion, drift thresholds and the single-sample
//! real-time scorer.

use serde::{Deserialize, Serialize};

use crate::schema::CommonMetadata;

// ── YAML-level types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfigRule {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub spec: ScoringConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfigSpec {
    pub anomaly: AnomalyParams,
    pub risk: RiskParams,
    pub drift: DriftParams,
    pub realtime: RealtimeParams,
}

// ── Anomaly scorer ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AnomalyParams {
    /// Rows with `time_sec / 60` below this and no high motion form the
    /// normal segment the estimators are fitted on.
    pub normal_segment_minutes: f64,
    /// Feature columns fed to the estimators, in order.
    pub feature_columns: Vec<String>,
    pub isolation_forest: IsolationForestParams,
    pub pca: PcaParams,
    pub weights: HybridWeights,
    /// `hybrid_anomaly` is set when the hybrid score reaches this value.
    pub hybrid_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IsolationForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PcaParams {
    /// Fraction of variance the retained components must explain.
    pub variance_retained: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HybridWeights {
    pub isolation_forest: f64,
    pub pca: f64,
}

// ── Final risk ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RiskParams {
    pub weights: RiskWeights,
    /// Blend of the normalized anomaly and trend scores used as confidence.
    pub confidence_weights: ConfidenceWeights,
    pub red_threshold: f64,
    pub amber_threshold: f64,
    /// Columns whose absolute values are averaged into the trend severity.
    pub trend_features: Vec<String>,
    /// Added to the denominator of min-max normalization.
    pub normalization_epsilon: f64,
    #[serde(default)]
    pub final_alert_source: FinalAlertSource,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RiskWeights {
    pub anomaly: f64,
    pub trend: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceWeights {
    pub anomaly: f64,
    pub trend: f64,
}

/// Which anomaly signal confirms a RED final alert.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinalAlertSource {
    /// The scorer's `hybrid_anomaly` flag.
    #[default]
    HybridAnomaly,
    /// An alert gate state of HIGH or CRITICAL.
    Gate,
}

// ── Drift ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DriftParams {
    /// A column drifts when its mean z-score exceeds this value.
    pub z_threshold: f64,
}

// ── Real-time scorer ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RealtimeParams {
    pub heart_rate: ThresholdContribution,
    pub spo2: ThresholdContribution,
    pub max_risk: f64,
    pub red_threshold: f64,
    pub amber_threshold: f64,
    pub confidence: ConfidenceParams,
}

/// Points added per unit a vital sits beyond its threshold, capped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThresholdContribution {
    pub threshold: f64,
    pub points_per_unit: f64,
    pub max_points: f64,
}

impl ThresholdContribution {
    /// Contribution of a value that exceeds the threshold from above.
    pub fn above(&self, value: f64) -> f64 {
        if value > self.threshold {
            ((value - self.threshold) * self.points_per_unit).min(self.max_points)
        } else {
            0.0
        }
    }

    /// Contribution of a value that falls below the threshold.
    pub fn below(&self, value: f64) -> f64 {
        if value < self.threshold {
            ((self.threshold - value) * self.points_per_unit).min(self.max_points)
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfidenceParams {
    pub base: f64,
    pub divisor: f64,
    pub max: f64,
}

impl Default for ScoringConfigSpec {
    fn default() -> Self {
        Self {
            anomaly: AnomalyParams {
                normal_segment_minutes: 10.0,
                feature_columns: [
                    "hr_mean_30s",
                    "hr_slope_30s",
                    "hr_std_30s",
                    "spo2_mean_30s",
                    "spo2_delta_from_baseline",
                    "spo2_seconds_below_94",
                    "sys_bp_mean_60s",
                    "sys_bp_slope_60s",
                    "motion_mean_10s",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
                isolation_forest: IsolationForestParams {
                    n_estimators: 300,
                    max_samples: 256,
                    seed: 42,
                },
                pca: PcaParams {
                    variance_retained: 0.95,
                },
                weights: HybridWeights {
                    isolation_forest: 0.6,
                    pca: 0.4,
                },
                hybrid_threshold: 0.6,
            },
            risk: RiskParams {
                weights: RiskWeights {
                    anomaly: 0.6,
                    trend: 0.3,
                    confidence: 0.1,
                },
                confidence_weights: ConfidenceWeights {
                    anomaly: 0.6,
                    trend: 0.4,
                },
                red_threshold: 70.0,
                amber_threshold: 40.0,
                trend_features: ["hr_slope_30s", "spo2_slope_60s", "sys_bp_slope_60s"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
                normalization_epsilon: 1e-6,
                final_alert_source: FinalAlertSource::HybridAnomaly,
            },
            drift: DriftParams { z_threshold: 2.5 },
            realtime: RealtimeParams {
                heart_rate: ThresholdContribution {
                    threshold: 100.0,
                    points_per_unit: 0.8,
                    max_points: 30.0,
                },
                spo2: ThresholdContribution {
                    threshold: 94.0,
                    points_per_unit: 5.0,
                    max_points: 50.0,
                },
                max_risk: 100.0,
                red_threshold: 60.0,
                amber_threshold: 45.0,
                confidence: ConfidenceParams {
                    base: 0.5,
                    divisor: 200.0,
                    max: 0.99,
                },
            },
        }
    }
}

// ── Compiled type ───────────────────────────────────────────────────

pub type CompiledScoringConfig = ScoringConfigSpec;

impl ScoringConfigRule {
    pub fn compile(&self) -> CompiledScoringConfig {
        self.spec.clone()
    }

    pub fn builtin() -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "ScoringConfig".to_string(),
            metadata: CommonMetadata::builtin("scoring-default", "Default scoring parameters"),
            spec: ScoringConfigSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scoring_config_yaml() {
        let yaml = include_str!("../../../data/rules/scoring/scoring-config.yml");
        let rule: ScoringConfigRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.kind, "ScoringConfig");
        assert_eq!(rule.metadata.id, "scoring-default");
        assert_eq!(rule.compile(), ScoringConfigSpec::default());
    }

    #[test]
    fn weights_sum_to_one() {
        let spec = ScoringConfigSpec::default();
        let w = &spec.anomaly.weights;
        assert!((w.isolation_forest + w.pca - 1.0).abs() < 1e-9);
        let r = &spec.risk.weights;
        assert!((r.anomaly + r.trend + r.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn final_alert_source_parses_snake_case() {
        let src: FinalAlertSource = serde_yaml::from_str("gate").unwrap();
        assert_eq!(src, FinalAlertSource::Gate);
        let src: FinalAlertSource = serde_yaml::from_str("hybrid_anomaly").unwrap();
        assert_eq!(src, FinalAlertSource::HybridAnomaly);
    }

    #[test]
    fn threshold_contribution_caps() {
        let realtime = ScoringConfigSpec::default().realtime;
        assert_eq!(realtime.heart_rate.above(90.0), 0.0);
        assert!((realtime.heart_rate.above(110.0) - 8.0).abs() < 1e-9);
        assert_eq!(realtime.heart_rate.above(200.0), 30.0);
        assert_eq!(realtime.spo2.below(96.0), 0.0);
        assert!((realtime.spo2.below(92.0) - 10.0).abs() < 1e-9);
        assert_eq!(realtime.spo2.below(50.0), 50.0);
    }
}
