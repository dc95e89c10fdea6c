//! Per-row records produced by each pipeline stage.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Windowed features at one emitted sample index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub time_sec: u64,
    pub heart_rate_bpm: f64,
    pub spo2_percent: f64,
    pub bp_systolic: f64,
    /// Not windowed, so it may be missing on an emitted row.
    pub bp_diastolic: Option<f64>,
    pub motion: f64,
    pub hr_mean_30s: f64,
    pub hr_std_30s: f64,
    pub hr_slope_30s: f64,
    pub spo2_mean_30s: f64,
    pub spo2_delta_from_baseline: f64,
    pub spo2_seconds_below_94: f64,
    pub spo2_slope_60s: f64,
    pub sys_bp_mean_60s: f64,
    pub sys_bp_slope_60s: f64,
    pub motion_mean_10s: f64,
    pub high_motion: bool,
}

impl FeatureVector {
    /// Numeric feature by column name.
    pub fn feature(&self, name: &str) -> Option<f64> {
        let v = match name {
            "hr_mean_30s" => self.hr_mean_30s,
            "hr_std_30s" => self.hr_std_30s,
            "hr_slope_30s" => self.hr_slope_30s,
            "spo2_mean_30s" => self.spo2_mean_30s,
            "spo2_delta_from_baseline" => self.spo2_delta_from_baseline,
            "spo2_seconds_below_94" => self.spo2_seconds_below_94,
            "spo2_slope_60s" => self.spo2_slope_60s,
            "sys_bp_mean_60s" => self.sys_bp_mean_60s,
            "sys_bp_slope_60s" => self.sys_bp_slope_60s,
            "motion_mean_10s" => self.motion_mean_10s,
            _ => return None,
        };
        Some(v)
    }

    pub fn time_min(&self) -> f64 {
        self.time_sec as f64 / 60.0
    }
}

/// Why the severity detector reached its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeverityReason {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "HR rising trend")]
    HrRisingTrend,
    #[serde(rename = "HR rise + sustained SpO2 drop")]
    HrRiseSpo2Drop,
    #[serde(rename = "HR + SpO2 + BP deterioration")]
    FullDeterioration,
}

impl SeverityReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SeverityReason::Normal => "normal",
            SeverityReason::HrRisingTrend => "HR rising trend",
            SeverityReason::HrRiseSpo2Drop => "HR rise + sustained SpO2 drop",
            SeverityReason::FullDeterioration => "HR + SpO2 + BP deterioration",
        }
    }
}

impl fmt::Display for SeverityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityRecord {
    pub hr_anomaly: bool,
    pub spo2_anomaly: bool,
    pub bp_anomaly: bool,
    /// 0..=3
    pub anomaly_level: u8,
    pub reason: SeverityReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScore {
    pub density_score: f64,
    pub reconstruction_score: f64,
    pub density_norm: f64,
    pub reconstruction_norm: f64,
    pub hybrid_score: f64,
    pub hybrid_anomaly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertLevel {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "SUPPRESSED")]
    Suppressed,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Normal => "normal",
            AlertLevel::Suppressed => "SUPPRESSED",
            AlertLevel::High => "HIGH",
            AlertLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub final_alert: bool,
    pub alert_level: AlertLevel,
    pub alert_reason: String,
    /// Mean of the smoothing buffer at this index.
    pub avg_risk: f64,
}

/// Triage level shared by the batch and real-time scorers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Green,
    Amber,
    Red,
}

impl RiskLevel {
    /// Map a score onto a level given the two lower bounds.
    pub fn from_score(score: f64, amber: f64, red: f64) -> Self {
        if score >= red {
            RiskLevel::Red
        } else if score >= amber {
            RiskLevel::Amber
        } else {
            RiskLevel::Green
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Green => "GREEN",
            RiskLevel::Amber => "AMBER",
            RiskLevel::Red => "RED",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub time_sec: u64,
    pub trend_severity: f64,
    pub anomaly_norm: f64,
    pub trend_norm: f64,
    pub confidence: f64,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub final_alert_flag: bool,
}

/// Flat audit row written to the decision CSV: every intermediate column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    pub time_sec: u64,
    pub heart_rate_bpm: f64,
    pub spo2_percent: f64,
    pub bp_systolic: f64,
    pub bp_diastolic: Option<f64>,
    pub motion: f64,
    pub hr_mean_30s: f64,
    pub hr_std_30s: f64,
    pub hr_slope_30s: f64,
    pub spo2_mean_30s: f64,
    pub spo2_delta_from_baseline: f64,
    pub spo2_seconds_below_94: f64,
    pub spo2_slope_60s: f64,
    pub sys_bp_mean_60s: f64,
    pub sys_bp_slope_60s: f64,
    pub motion_mean_10s: f64,
    pub high_motion_flag: u8,
    pub hr_anomaly: u8,
    pub spo2_anomaly: u8,
    pub bp_anomaly: u8,
    pub anomaly_level: u8,
    pub reason: String,
    pub if_score: f64,
    pub pca_error: f64,
    pub if_score_norm: f64,
    pub pca_score_norm: f64,
    pub hybrid_risk_score: f64,
    pub hybrid_anomaly: u8,
    pub avg_risk: f64,
    pub final_alert: u8,
    pub alert_level: String,
    pub alert_reason: String,
    pub trend_severity: f64,
    pub anomaly_norm: f64,
    pub trend_norm: f64,
    pub confidence: f64,
    pub risk_score: f64,
    pub risk_level: String,
    pub final_alert_flag: u8,
}

impl DecisionRow {
    pub fn assemble(
        f: &FeatureVector,
        s: &SeverityRecord,
        a: &AnomalyScore,
        g: &AlertState,
        d: &DecisionRecord,
    ) -> Self {
        Self {
            time_sec: f.time_sec,
            heart_rate_bpm: f.heart_rate_bpm,
            spo2_percent: f.spo2_percent,
            bp_systolic: f.bp_systolic,
            bp_diastolic: f.bp_diastolic,
            motion: f.motion,
            hr_mean_30s: f.hr_mean_30s,
            hr_std_30s: f.hr_std_30s,
            hr_slope_30s: f.hr_slope_30s,
            spo2_mean_30s: f.spo2_mean_30s,
            spo2_delta_from_baseline: f.spo2_delta_from_baseline,
            spo2_seconds_below_94: f.spo2_seconds_below_94,
            spo2_slope_60s: f.spo2_slope_60s,
            sys_bp_mean_60s: f.sys_bp_mean_60s,
            sys_bp_slope_60s: f.sys_bp_slope_60s,
            motion_mean_10s: f.motion_mean_10s,
            high_motion_flag: u8::from(f.high_motion),
            hr_anomaly: u8::from(s.hr_anomaly),
            spo2_anomaly: u8::from(s.spo2_anomaly),
            bp_anomaly: u8::from(s.bp_anomaly),
            anomaly_level: s.anomaly_level,
            reason: s.reason.to_string(),
            if_score: a.density_score,
            pca_error: a.reconstruction_score,
            if_score_norm: a.density_norm,
            pca_score_norm: a.reconstruction_norm,
            hybrid_risk_score: a.hybrid_score,
            hybrid_anomaly: u8::from(a.hybrid_anomaly),
            avg_risk: g.avg_risk,
            final_alert: u8::from(g.final_alert),
            alert_level: g.alert_level.to_string(),
            alert_reason: g.alert_reason.clone(),
            trend_severity: d.trend_severity,
            anomaly_norm: d.anomaly_norm,
            trend_norm: d.trend_norm,
            confidence: d.confidence,
            risk_score: d.risk_score,
            risk_level: d.risk_level.to_string(),
            final_alert_flag: u8::from(d.final_alert_flag),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_bounds_are_inclusive() {
        assert_eq!(RiskLevel::from_score(70.0, 40.0, 70.0), RiskLevel::Red);
        assert_eq!(RiskLevel::from_score(69.99, 40.0, 70.0), RiskLevel::Amber);
        assert_eq!(RiskLevel::from_score(40.0, 40.0, 70.0), RiskLevel::Amber);
        assert_eq!(RiskLevel::from_score(39.99, 40.0, 70.0), RiskLevel::Green);
    }

    #[test]
    fn labels_serialize_as_audit_strings() {
        assert_eq!(serde_json::to_string(&AlertLevel::Suppressed).unwrap(), "\"SUPPRESSED\"");
        assert_eq!(serde_json::to_string(&AlertLevel::Normal).unwrap(), "\"normal\"");
        assert_eq!(serde_json::to_string(&RiskLevel::Amber).unwrap(), "\"AMBER\"");
        assert_eq!(
            serde_json::to_string(&SeverityReason::HrRiseSpo2Drop).unwrap(),
            "\"HR rise + sustained SpO2 drop\""
        );
    }
}
