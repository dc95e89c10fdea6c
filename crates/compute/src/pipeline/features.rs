//! Windowed feature extraction over a cleaned vitals run.
//!
//! Every feature is a trailing window ending at the current sample. A row is
//! emitted only when every window is full and gap-free; earlier rows and rows
//! whose windows hold a missing value are dropped, never padded.

use tracing::debug;

use triage_core::{FeatureFrame, Result, TriageError, VitalsSample};
use triage_rules::feature_config::CompiledFeatureConfig;

use crate::window::RollingWindow;

use super::types::FeatureVector;

/// Mean SpO2 over the first samples of a run, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spo2Baseline(f64);

impl Spo2Baseline {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Mean of the defined SpO2 readings among the first `samples` entries.
    pub fn from_run(run: &[VitalsSample], samples: usize) -> Result<Self> {
        let (sum, n) = run
            .iter()
            .take(samples)
            .filter_map(|s| s.spo2_percent)
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if n == 0 {
            return Err(TriageError::MissingUpstreamArtifact(format!(
                "no SpO2 readings in the first {samples} samples to form a baseline"
            )));
        }
        Ok(Self(sum / n as f64))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Streaming extractor: one [`push`](Self::push) per sample, in time order.
pub struct FeatureExtractor {
    baseline: Spo2Baseline,
    spo2_threshold: f64,
    high_motion_threshold: f64,
    hr: RollingWindow,
    spo2_mean: RollingWindow,
    spo2_persistence: RollingWindow,
    bp_systolic: RollingWindow,
    motion: RollingWindow,
}

impl FeatureExtractor {
    pub fn new(config: &CompiledFeatureConfig, baseline: Spo2Baseline) -> Self {
        let w = &config.windows;
        Self {
            baseline,
            spo2_threshold: config.spo2_threshold,
            high_motion_threshold: config.high_motion_threshold,
            hr: RollingWindow::new(w.heart_rate),
            spo2_mean: RollingWindow::new(w.spo2_mean),
            spo2_persistence: RollingWindow::new(w.spo2_persistence),
            bp_systolic: RollingWindow::new(w.bp_systolic),
            motion: RollingWindow::new(w.motion),
        }
    }

    /// Advance every window by one sample.
    pub fn push(&mut self, sample: &VitalsSample) -> Option<FeatureVector> {
        self.hr.push(sample.heart_rate_bpm);
        self.spo2_mean.push(sample.spo2_percent);
        self.spo2_persistence.push(sample.spo2_percent);
        self.bp_systolic.push(sample.bp_systolic);
        self.motion.push(sample.motion);

        let hr = self.hr.view()?;
        let spo2_mean = self.spo2_mean.view()?;
        let spo2_persist = self.spo2_persistence.view()?;
        let bp = self.bp_systolic.view()?;
        let motion = self.motion.view()?;

        let spo2_mean_30s = spo2_mean.mean();
        let motion_mean_10s = motion.mean();

        Some(FeatureVector {
            time_sec: sample.time_sec,
            heart_rate_bpm: sample.heart_rate_bpm?,
            spo2_percent: sample.spo2_percent?,
            bp_systolic: sample.bp_systolic?,
            bp_diastolic: sample.bp_diastolic,
            motion: sample.motion?,
            hr_mean_30s: hr.mean(),
            hr_std_30s: hr.sample_std(),
            hr_slope_30s: hr.slope(),
            spo2_mean_30s,
            spo2_delta_from_baseline: spo2_mean_30s - self.baseline.value(),
            spo2_seconds_below_94: spo2_persist.count_below(self.spo2_threshold) as f64,
            spo2_slope_60s: spo2_persist.slope(),
            sys_bp_mean_60s: bp.mean(),
            sys_bp_slope_60s: bp.slope(),
            motion_mean_10s,
            high_motion: motion_mean_10s > self.high_motion_threshold,
        })
    }

    /// Extract the whole run. The SpO2 baseline is computed from the run.
    pub fn extract(config: &CompiledFeatureConfig, run: &[VitalsSample]) -> Result<Vec<FeatureVector>> {
        let baseline = Spo2Baseline::from_run(run, config.spo2_baseline_samples)?;
        Ok(Self::extract_with_baseline(config, baseline, run))
    }

    pub fn extract_with_baseline(
        config: &CompiledFeatureConfig,
        baseline: Spo2Baseline,
        run: &[VitalsSample],
    ) -> Vec<FeatureVector> {
        let mut extractor = Self::new(config, baseline);
        let features: Vec<FeatureVector> = run.iter().filter_map(|s| extractor.push(s)).collect();
        debug!(
            samples = run.len(),
            emitted = features.len(),
            dropped = run.len() - features.len(),
            spo2_baseline = baseline.value(),
            "feature extraction complete"
        );
        features
    }
}

/// Numeric columns of a feature batch, in output order.
pub const FEATURE_FRAME_COLUMNS: [&str; 17] = [
    "time_sec",
    "heart_rate_bpm",
    "spo2_percent",
    "bp_systolic",
    "bp_diastolic",
    "motion",
    "hr_mean_30s",
    "hr_std_30s",
    "hr_slope_30s",
    "spo2_mean_30s",
    "spo2_delta_from_baseline",
    "spo2_seconds_below_94",
    "spo2_slope_60s",
    "sys_bp_mean_60s",
    "sys_bp_slope_60s",
    "motion_mean_10s",
    "high_motion_flag",
];

/// Lay a feature batch out as named columns (missing diastolic becomes NaN).
pub fn to_frame(features: &[FeatureVector]) -> Result<FeatureFrame> {
    let mut frame = FeatureFrame::new();
    for name in FEATURE_FRAME_COLUMNS {
        let values = features
            .iter()
            .map(|f| match name {
                "time_sec" => f.time_sec as f64,
                "heart_rate_bpm" => f.heart_rate_bpm,
                "spo2_percent" => f.spo2_percent,
                "bp_systolic" => f.bp_systolic,
                "bp_diastolic" => f.bp_diastolic.unwrap_or(f64::NAN),
                "motion" => f.motion,
                "high_motion_flag" => f64::from(u8::from(f.high_motion)),
                other => f.feature(other).unwrap_or(f64::NAN),
            })
            .collect();
        frame.insert(name, values)?;
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_rules::feature_config::FeatureConfigSpec;

    fn steady(n: u64) -> Vec<VitalsSample> {
        (0..n)
            .map(|t| VitalsSample::complete(t, 80.0, 97.0, 120.0, 80.0, 0.2))
            .collect()
    }

    #[test]
    fn first_row_waits_for_longest_window() {
        let config = FeatureConfigSpec::default();
        let features = FeatureExtractor::extract(&config, &steady(100)).unwrap();
        assert_eq!(features.len(), 100 - 59);
        assert_eq!(features[0].time_sec, 59);
    }

    #[test]
    fn missing_value_drops_every_row_whose_window_covers_it() {
        let config = FeatureConfigSpec::default();
        let mut run = steady(200);
        run[100].heart_rate_bpm = None;
        let features = FeatureExtractor::extract(&config, &run).unwrap();
        let times: Vec<u64> = features.iter().map(|f| f.time_sec).collect();
        // HR window is 30: indices 100..=129 are unavailable.
        assert!(times.contains(&99));
        assert!(!times.iter().any(|t| (100..=129).contains(t)));
        assert!(times.contains(&130));
    }

    #[test]
    fn missing_bp_blocks_sixty_rows() {
        let config = FeatureConfigSpec::default();
        let mut run = steady(200);
        run[100].bp_systolic = None;
        let features = FeatureExtractor::extract(&config, &run).unwrap();
        assert_eq!(features.len(), 141 - 60);
        assert!(features.iter().all(|f| !(100..=159).contains(&f.time_sec)));
    }

    #[test]
    fn linear_hr_slope_is_exact() {
        let config = FeatureConfigSpec::default();
        let run: Vec<VitalsSample> = (0..120)
            .map(|t| VitalsSample::complete(t, 75.0 + 0.5 * t as f64, 97.0, 120.0, 80.0, 0.2))
            .collect();
        let features = FeatureExtractor::extract(&config, &run).unwrap();
        for f in &features {
            assert!((f.hr_slope_30s - 0.5).abs() < 1e-9);
            assert!(f.sys_bp_slope_60s.abs() < 1e-12);
        }
    }

    #[test]
    fn spo2_persistence_and_baseline() {
        let config = FeatureConfigSpec::default();
        let mut run = steady(400);
        for s in run.iter_mut().skip(340) {
            s.spo2_percent = Some(90.0);
        }
        let baseline = Spo2Baseline::from_run(&run, 300).unwrap();
        assert_eq!(baseline.value(), 97.0);

        let features = FeatureExtractor::extract(&config, &run).unwrap();
        let last = features.last().unwrap();
        assert_eq!(last.time_sec, 399);
        assert_eq!(last.spo2_seconds_below_94, 60.0);
        assert!((last.spo2_delta_from_baseline + 7.0).abs() < 1e-9);

        let at_369 = features.iter().find(|f| f.time_sec == 369).unwrap();
        assert_eq!(at_369.spo2_seconds_below_94, 30.0);
    }

    #[test]
    fn high_motion_is_strict_mean_threshold() {
        let config = FeatureConfigSpec::default();
        let mut run = steady(80);
        for s in run.iter_mut().skip(70) {
            s.motion = Some(0.7);
        }
        let features = FeatureExtractor::extract(&config, &run).unwrap();
        assert!(features.iter().all(|f| !f.high_motion));

        for s in run.iter_mut().skip(70) {
            s.motion = Some(0.95);
        }
        let features = FeatureExtractor::extract(&config, &run).unwrap();
        assert!(features.last().unwrap().high_motion);
    }

    #[test]
    fn baseline_without_spo2_is_missing_artifact() {
        let mut run = steady(10);
        for s in &mut run {
            s.spo2_percent = None;
        }
        let err = Spo2Baseline::from_run(&run, 300).unwrap_err();
        assert!(matches!(err, TriageError::MissingUpstreamArtifact(_)));
    }

    #[test]
    fn frame_has_one_column_per_feature() {
        let config = FeatureConfigSpec::default();
        let features = FeatureExtractor::extract(&config, &steady(70)).unwrap();
        let frame = to_frame(&features).unwrap();
        assert_eq!(frame.len(), 11);
        assert_eq!(frame.column_names().count(), FEATURE_FRAME_COLUMNS.len());
        assert_eq!(frame.mean("hr_mean_30s"), Some(80.0));
    }
}
