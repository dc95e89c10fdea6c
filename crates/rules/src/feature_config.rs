//! FeatureConfig rule kind: window lengths, clinical thresholds used by
//! the feature extractor, and motion-artifact filter parameters.

use serde::{Deserialize, Serialize};

use crate::schema::CommonMetadata;

// ── YAML-level types ────────────────────────────────────────────────

/// Top-level FeatureConfig rule document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfigRule {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub metadata: CommonMetadata,
    pub spec: FeatureConfigSpec,
}

/// Specification section of a FeatureConfig rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfigSpec {
    /// Trailing window lengths, in samples (one sample per second).
    pub windows: WindowLengths,
    /// Number of leading samples averaged into the per-run SpO2 baseline.
    pub spo2_baseline_samples: usize,
    /// SpO2 below this value counts toward the persistence feature.
    pub spo2_threshold: f64,
    /// Motion mean above this value marks the row as high motion.
    pub high_motion_threshold: f64,
    /// Motion-artifact filter applied before feature extraction on request.
    #[serde(default)]
    pub artifact_filter: ArtifactFilterParams,
}

/// Trailing window lengths for each feature family.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WindowLengths {
    /// HR mean / std / slope.
    pub heart_rate: usize,
    /// SpO2 rolling mean.
    pub spo2_mean: usize,
    /// SpO2 seconds-below-threshold count and auxiliary SpO2 slope.
    pub spo2_persistence: usize,
    /// Systolic BP mean / slope.
    pub bp_systolic: usize,
    /// Motion mean.
    pub motion: usize,
}

/// Parameters of the motion-artifact filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ArtifactFilterParams {
    /// Maximum consecutive missing samples filled by interpolation.
    pub interpolate_limit: usize,
    /// Width of the centred median used as the local reference.
    pub median_window: usize,
    /// Raw motion above this value makes a sample eligible for suppression.
    pub motion_threshold: f64,
    /// HR deviation from the local median (bpm) treated as a motion spike.
    pub hr_spike_threshold: f64,
    /// SpO2 drop below the local median (%) treated as a false desaturation.
    pub spo2_drop_threshold: f64,
}

impl Default for ArtifactFilterParams {
    fn default() -> Self {
        Self {
            interpolate_limit: 5,
            median_window: 5,
            motion_threshold: 0.7,
            hr_spike_threshold: 15.0,
            spo2_drop_threshold: 3.0,
        }
    }
}

impl Default for FeatureConfigSpec {
    fn default() -> Self {
        Self {
            windows: WindowLengths {
                heart_rate: 30,
                spo2_mean: 30,
                spo2_persistence: 60,
                bp_systolic: 60,
                motion: 10,
            },
            spo2_baseline_samples: 300,
            spo2_threshold: 94.0,
            high_motion_threshold: 0.7,
            artifact_filter: ArtifactFilterParams::default(),
        }
    }
}

impl WindowLengths {
    /// Longest window; the first emitted row sits at this index minus one.
    pub fn max(&self) -> usize {
        [
            self.heart_rate,
            self.spo2_mean,
            self.spo2_persistence,
            self.bp_systolic,
            self.motion,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

// ── Compiled type ───────────────────────────────────────────────────

/// Compiled feature config. The `spec` section is already fully typed.
pub type CompiledFeatureConfig = FeatureConfigSpec;

impl FeatureConfigRule {
    pub fn compile(&self) -> CompiledFeatureConfig {
        self.spec.clone()
    }

    /// The built-in document used when the rules directory has none.
    pub fn builtin() -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "FeatureConfig".to_string(),
            metadata: CommonMetadata::builtin("features-default", "Default feature windows"),
            spec: FeatureConfigSpec::default(),
        }
    }
}
