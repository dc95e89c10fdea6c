//! Unsupervised anomaly scoring: two outlier estimators fitted on the normal
//! segment and fused into a hybrid score.
//!
//! Sub-modules:
//! - [`scaler`]: batch standardization
//! - [`isolation_forest`]: density/isolation estimator
//! - [`pca`]: reconstruction estimator

pub mod isolation_forest;
pub mod pca;
pub mod scaler;

use tracing::{debug, info};

use triage_core::{Result, TriageError};
use triage_rules::scoring_config::AnomalyParams;

use super::types::{AnomalyScore, FeatureVector};

pub use isolation_forest::IsolationForest;
pub use pca::PcaReconstruction;
pub use scaler::StandardScaler;

/// Denominator epsilon for raw-score normalization.
const NORMALIZATION_EPSILON: f64 = 1e-12;

/// Capability shared by the outlier estimators.
///
/// `fit` sees only normal-segment rows; `score` returns one raw score per row,
/// higher meaning more anomalous.
pub trait OutlierEstimator {
    fn name(&self) -> &'static str;

    fn fit(&mut self, normal_rows: &[Vec<f64>]) -> Result<()>;

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn is_fitted(&self) -> bool;
}

/// The closed set of estimators the scorer combines.
#[derive(Debug, Clone)]
pub enum Estimator {
    IsolationForest(IsolationForest),
    Pca(PcaReconstruction),
}

impl OutlierEstimator for Estimator {
    fn name(&self) -> &'static str {
        match self {
            Estimator::IsolationForest(e) => e.name(),
            Estimator::Pca(e) => e.name(),
        }
    }

    fn fit(&mut self, normal_rows: &[Vec<f64>]) -> Result<()> {
        match self {
            Estimator::IsolationForest(e) => e.fit(normal_rows),
            Estimator::Pca(e) => e.fit(normal_rows),
        }
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        match self {
            Estimator::IsolationForest(e) => e.score(rows),
            Estimator::Pca(e) => e.score(rows),
        }
    }

    fn is_fitted(&self) -> bool {
        match self {
            Estimator::IsolationForest(e) => e.is_fitted(),
            Estimator::Pca(e) => e.is_fitted(),
        }
    }
}

pub struct AnomalyScorer {
    params: AnomalyParams,
    density: Estimator,
    reconstruction: Estimator,
}

impl AnomalyScorer {
    pub fn new(params: &AnomalyParams) -> Self {
        Self {
            density: Estimator::IsolationForest(IsolationForest::new(params.isolation_forest.clone())),
            reconstruction: Estimator::Pca(PcaReconstruction::new(params.pca.clone())),
            params: params.clone(),
        }
    }

    /// Model input matrix, one row per feature vector in configured column order.
    pub fn model_rows(&self, features: &[FeatureVector]) -> Result<Vec<Vec<f64>>> {
        features
            .iter()
            .map(|f| {
                self.params
                    .feature_columns
                    .iter()
                    .map(|col| {
                        f.feature(col).ok_or_else(|| TriageError::SchemaMismatch {
                            column: col.clone(),
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Whether a row belongs to the normal segment used for fitting.
    pub fn is_normal(&self, f: &FeatureVector) -> bool {
        f.time_min() < self.params.normal_segment_minutes && !f.high_motion
    }

    /// Fit both estimators on the batch's normal segment, then score every row.
    pub fn score_batch(&mut self, features: &[FeatureVector]) -> Result<Vec<AnomalyScore>> {
        if features.is_empty() {
            return Err(TriageError::MissingUpstreamArtifact(
                "anomaly scorer received no feature rows".to_string(),
            ));
        }
        let rows = self.model_rows(features)?;
        let scaler = StandardScaler::fit(&rows)?;
        let scaled = scaler.transform(&rows);

        let normal: Vec<Vec<f64>> = features
            .iter()
            .zip(&scaled)
            .filter(|(f, _)| self.is_normal(f))
            .map(|(_, row)| row.clone())
            .collect();
        if normal.is_empty() {
            return Err(TriageError::MissingUpstreamArtifact(format!(
                "normal segment is empty (no low-motion rows before minute {})",
                self.params.normal_segment_minutes
            )));
        }

        self.density.fit(&normal)?;
        self.reconstruction.fit(&normal)?;

        let density_raw = self.density.score(&scaled)?;
        let reconstruction_raw = self.reconstruction.score(&scaled)?;
        let density_norm = min_max_normalize(&density_raw, NORMALIZATION_EPSILON);
        let reconstruction_norm = min_max_normalize(&reconstruction_raw, NORMALIZATION_EPSILON);

        let w = &self.params.weights;
        let scores: Vec<AnomalyScore> = (0..features.len())
            .map(|i| {
                let hybrid_score = w.isolation_forest * density_norm[i] + w.pca * reconstruction_norm[i];
                AnomalyScore {
                    density_score: density_raw[i],
                    reconstruction_score: reconstruction_raw[i],
                    density_norm: density_norm[i],
                    reconstruction_norm: reconstruction_norm[i],
                    hybrid_score,
                    hybrid_anomaly: hybrid_score >= self.params.hybrid_threshold,
                }
            })
            .collect();

        info!(
            rows = scores.len(),
            normal_rows = normal.len(),
            density = self.density.name(),
            reconstruction = self.reconstruction.name(),
            hybrid_anomalies = scores.iter().filter(|s| s.hybrid_anomaly).count(),
            "anomaly scoring complete"
        );
        Ok(scores)
    }
}

/// Min-max scale to `[0, 1]`. A constant batch maps to 0 instead of failing.
pub fn min_max_normalize(values: &[f64], epsilon: f64) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    if values.is_empty() {
        return Vec::new();
    }
    if max - min <= 0.0 {
        debug!(rows = values.len(), value = min, "degenerate normalization, batch is constant");
    }
    values.iter().map(|v| (v - min) / (max - min + epsilon)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_rules::scoring_config::ScoringConfigSpec;

    fn vector(t: u64, hr: f64, spo2: f64, motion: f64) -> FeatureVector {
        FeatureVector {
            time_sec: t,
            heart_rate_bpm: hr,
            spo2_percent: spo2,
            bp_systolic: 120.0,
            bp_diastolic: Some(80.0),
            motion,
            hr_mean_30s: hr,
            hr_std_30s: 1.0 + (t % 7) as f64 * 0.1,
            hr_slope_30s: ((t % 11) as f64 - 5.0) * 0.01,
            spo2_mean_30s: spo2,
            spo2_delta_from_baseline: spo2 - 97.0,
            spo2_seconds_below_94: if spo2 < 94.0 { 60.0 } else { 0.0 },
            spo2_slope_60s: 0.0,
            sys_bp_mean_60s: 120.0 + (t % 5) as f64,
            sys_bp_slope_60s: ((t % 13) as f64 - 6.0) * 0.005,
            motion_mean_10s: motion,
            high_motion: motion > 0.7,
        }
    }

    fn batch() -> Vec<FeatureVector> {
        let mut rows: Vec<FeatureVector> = (60..900)
            .map(|t| vector(t, 80.0 + (t % 3) as f64, 97.0 - (t % 2) as f64 * 0.5, 0.2))
            .collect();
        rows.extend((900..960).map(|t| vector(t, 130.0, 88.0, 0.2)));
        rows
    }

    fn params() -> AnomalyParams {
        let mut p = ScoringConfigSpec::default().anomaly;
        p.isolation_forest.n_estimators = 60;
        p
    }

    #[test]
    fn normalization_spans_unit_interval() {
        let norm = min_max_normalize(&[3.0, 1.0, 2.0], 1e-12);
        assert!(norm[1].abs() < 1e-9);
        assert!((norm[0] - 1.0).abs() < 1e-9);
        assert!((norm[2] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn constant_batch_normalizes_to_zero() {
        let norm = min_max_normalize(&[4.0, 4.0], 1e-12);
        assert_eq!(norm, vec![0.0, 0.0]);
        assert!(min_max_normalize(&[], 1e-12).is_empty());
    }

    #[test]
    fn deterioration_scores_above_normal_segment() {
        let features = batch();
        let mut scorer = AnomalyScorer::new(&params());
        let scores = scorer.score_batch(&features).unwrap();
        assert_eq!(scores.len(), features.len());

        let normal_mean =
            scores[..540].iter().map(|s| s.hybrid_score).sum::<f64>() / 540.0;
        let tail_mean = scores[840..].iter().map(|s| s.hybrid_score).sum::<f64>() / 60.0;
        assert!(tail_mean > normal_mean);
        let flagged_rate = |rows: &[AnomalyScore]| {
            rows.iter().filter(|s| s.hybrid_anomaly).count() as f64 / rows.len() as f64
        };
        assert!(flagged_rate(&scores[840..]) > 0.0);
        assert!(flagged_rate(&scores[840..]) > flagged_rate(&scores[..540]));

        let min = scores.iter().map(|s| s.density_norm).fold(f64::INFINITY, f64::min);
        let max = scores.iter().map(|s| s.density_norm).fold(f64::NEG_INFINITY, f64::max);
        assert!(min.abs() < 1e-9);
        assert!((max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn scoring_is_reproducible() {
        let features = batch();
        let a = AnomalyScorer::new(&params()).score_batch(&features).unwrap();
        let b = AnomalyScorer::new(&params()).score_batch(&features).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_normal_segment_is_missing_artifact() {
        let features: Vec<FeatureVector> = (700..760).map(|t| vector(t, 80.0, 97.0, 0.2)).collect();
        let err = AnomalyScorer::new(&params()).score_batch(&features).unwrap_err();
        assert!(matches!(err, TriageError::MissingUpstreamArtifact(_)));
    }

    #[test]
    fn unknown_model_column_is_schema_mismatch() {
        let mut p = params();
        p.feature_columns.push("lactate_mean".to_string());
        let err = AnomalyScorer::new(&p).score_batch(&batch()).unwrap_err();
        match err {
            TriageError::SchemaMismatch { column } => assert_eq!(column, "lactate_mean"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
