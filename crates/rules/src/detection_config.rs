//! DetectionConfig rule kind: persistence rules of the severity detector
//! and the thresholds of the two-signal alert gate.

use serde::{Deserialize, Serialize};

use crate::schema::CommonMetadata;

// ── YAML-level types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfigRule {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub spec: DetectionConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfigSpec {
    pub heart_rate: SlopePersistenceRule,
    pub spo2: Spo2Rule,
    pub bp_systolic: SlopePersistenceRule,
    pub alert_gate: AlertGateThresholds,
}

/// A slope that must stay beyond a threshold for a whole lookback window.
///
/// For a rising rule the slope must exceed `slope_threshold`; for a falling
/// rule it must stay below it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SlopePersistenceRule {
    pub slope_threshold: f64,
    pub direction: SlopeDirection,
    /// Lookback, in rows.
    pub persist_rows: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlopeDirection {
    Rising,
    Falling,
}

impl SlopePersistenceRule {
    /// Whether a single slope value satisfies the rule's direction.
    pub fn holds(&self, slope: f64) -> bool {
        match self.direction {
            SlopeDirection::Rising => slope > self.slope_threshold,
            SlopeDirection::Falling => slope < self.slope_threshold,
        }
    }
}

/// SpO2 confirmation: fast path (baseline deviation plus short persistence)
/// or slow path (long persistence alone).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Spo2Rule {
    pub delta_threshold: f64,
    pub fast_persist_seconds: f64,
    pub slow_persist_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AlertGateThresholds {
    /// Number of trailing hybrid scores averaged into `avg_risk`.
    pub smoothing_window: usize,
    pub high_risk: f64,
    pub critical_risk: f64,
    /// Minimum rule level for a CRITICAL alert.
    pub critical_min_level: u8,
    /// Minimum rule level for a HIGH alert.
    pub high_min_level: u8,
}

impl Default for DetectionConfigSpec {
    fn default() -> Self {
        Self {
            heart_rate: SlopePersistenceRule {
                slope_threshold: 0.15,
                direction: SlopeDirection::Rising,
                persist_rows: 30,
            },
            spo2: Spo2Rule {
                delta_threshold: -3.0,
                fast_persist_seconds: 30.0,
                slow_persist_seconds: 60.0,
            },
            bp_systolic: SlopePersistenceRule {
                slope_threshold: -0.05,
                direction: SlopeDirection::Falling,
                persist_rows: 60,
            },
            alert_gate: AlertGateThresholds {
                smoothing_window: 10,
                high_risk: 0.6,
                critical_risk: 0.8,
                critical_min_level: 2,
                high_min_level: 1,
            },
        }
    }
}

// ── Compiled type ───────────────────────────────────────────────────

pub type CompiledDetectionConfig = DetectionConfigSpec;

impl DetectionConfigRule {
    pub fn compile(&self) -> CompiledDetectionConfig {
        self.spec.clone()
    }

    pub fn builtin() -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "DetectionConfig".to_string(),
            metadata: CommonMetadata::builtin("detection-default", "Default detection rules"),
            spec: DetectionConfigSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_detection_config_yaml() {
        let yaml = include_str!("../../../data/rules/detection/detection-config.yml");
        let rule: DetectionConfigRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.kind, "DetectionConfig");
        assert_eq!(rule.compile(), DetectionConfigSpec::default());
    }

    #[test]
    fn gate_thresholds_ordered() {
        let yaml = include_str!("../../../data/rules/detection/detection-config.yml");
        let rule: DetectionConfigRule = serde_yaml::from_str(yaml).unwrap();
        let g = &rule.spec.alert_gate;
        assert!(g.high_risk < g.critical_risk);
        assert!(g.high_min_level <= g.critical_min_level);
    }

    #[test]
    fn slope_direction_semantics() {
        let spec = DetectionConfigSpec::default();
        assert!(spec.heart_rate.holds(0.2));
        assert!(!spec.heart_rate.holds(0.15));
        assert!(spec.bp_systolic.holds(-0.06));
        assert!(!spec.bp_systolic.holds(-0.05));
    }

    #[test]
    fn round_trip() {
        let yaml = include_str!("../../../data/rules/detection/detection-config.yml");
        let rule: DetectionConfigRule = serde_yaml::from_str(yaml).unwrap();
        let serialized = serde_yaml::to_string(&rule).unwrap();
        let rule2: DetectionConfigRule = serde_yaml::from_str(&serialized).unwrap();
        assert_eq!(rule, rule2);
    }
}
