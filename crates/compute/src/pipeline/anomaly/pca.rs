//! PCA reconstruction error: reconstruction-style outlier estimator.
//!
//! Components are the leading eigenvectors of the normal segment's
//! covariance, enough to explain the configured share of variance. A row's
//! score is its mean squared error after projecting onto those components
//! and back.

use nalgebra::{DMatrix, DVector, SymmetricEigen};
use tracing::debug;

use triage_core::{Result, TriageError};
use triage_rules::scoring_config::PcaParams;

use super::OutlierEstimator;

#[derive(Debug, Clone)]
struct Fitted {
    mean: DVector<f64>,
    /// d x k, one retained component per column.
    components: DMatrix<f64>,
}

#[derive(Debug, Clone)]
pub struct PcaReconstruction {
    params: PcaParams,
    fitted: Option<Fitted>,
}

impl PcaReconstruction {
    pub fn new(params: PcaParams) -> Self {
        Self { params, fitted: None }
    }

    /// Number of retained components, once fitted.
    pub fn n_components(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.components.ncols())
    }
}

impl OutlierEstimator for PcaReconstruction {
    fn name(&self) -> &'static str {
        "pca"
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn fit(&mut self, normal_rows: &[Vec<f64>]) -> Result<()> {
        let Some(first) = normal_rows.first() else {
            return Err(TriageError::MissingUpstreamArtifact(
                "pca needs at least one normal row".to_string(),
            ));
        };
        let n = normal_rows.len();
        let d = first.len();

        let mean = DVector::from_fn(d, |c, _| normal_rows.iter().map(|r| r[c]).sum::<f64>() / n as f64);
        let centered = DMatrix::from_fn(n, d, |r, c| normal_rows[r][c] - mean[c]);
        let cov = centered.transpose() * &centered / (n.saturating_sub(1).max(1) as f64);

        let eigen = SymmetricEigen::new(cov);
        let mut pairs: Vec<(f64, DVector<f64>)> = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(i, &v)| (v.max(0.0), eigen.eigenvectors.column(i).into_owned()))
            .collect();
        pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

        let k = retained_components(
            &pairs.iter().map(|p| p.0).collect::<Vec<_>>(),
            self.params.variance_retained,
        )
        .min(n.min(d))
        .max(1);

        let columns: Vec<DVector<f64>> = pairs.into_iter().take(k).map(|p| p.1).collect();
        let components = DMatrix::from_columns(&columns);

        debug!(rows = n, dims = d, components = k, "pca fitted");
        self.fitted = Some(Fitted { mean, components });
        Ok(())
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| {
            TriageError::MissingUpstreamArtifact("pca scored before fit".to_string())
        })?;
        let d = fitted.mean.len();
        Ok(rows
            .iter()
            .map(|row| {
                let z = DVector::from_column_slice(row) - &fitted.mean;
                let projected = fitted.components.transpose() * &z;
                let residual = &z - &fitted.components * projected;
                residual.norm_squared() / d as f64
            })
            .collect())
    }
}

/// Count of leading eigenvalues (sorted descending) whose cumulative share
/// of the total stays within `target`, plus one.
fn retained_components(eigenvalues: &[f64], target: f64) -> usize {
    let total: f64 = eigenvalues.iter().sum();
    if total <= 0.0 {
        return 1;
    }
    let mut cumulative = 0.0;
    let within = eigenvalues
        .iter()
        .take_while(|v| {
            cumulative += *v / total;
            cumulative <= target
        })
        .count();
    within + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PcaParams {
        PcaParams {
            variance_retained: 0.95,
        }
    }

    #[test]
    fn line_data_keeps_one_component() {
        // Points on y = 2x with tiny noise in y.
        let rows: Vec<Vec<f64>> = (0..50)
            .map(|i| {
                let x = i as f64;
                vec![x, 2.0 * x + if i % 2 == 0 { 0.01 } else { -0.01 }]
            })
            .collect();
        let mut pca = PcaReconstruction::new(params());
        pca.fit(&rows).unwrap();
        assert_eq!(pca.n_components(), Some(1));

        let scores = pca.score(&[vec![10.0, 20.0], vec![10.0, -20.0]]).unwrap();
        assert!(scores[0] < 1e-3);
        assert!(scores[1] > 10.0);
    }

    #[test]
    fn retained_count_follows_cumulative_share() {
        assert_eq!(retained_components(&[6.0, 3.0, 1.0], 0.95), 3);
        assert_eq!(retained_components(&[6.0, 3.0, 1.0], 0.9), 3);
        assert_eq!(retained_components(&[6.0, 3.0, 1.0], 0.89), 2);
        assert_eq!(retained_components(&[0.0, 0.0], 0.95), 1);
    }

    #[test]
    fn unfitted_pca_is_missing_artifact() {
        let pca = PcaReconstruction::new(params());
        assert!(matches!(
            pca.score(&[vec![1.0]]),
            Err(TriageError::MissingUpstreamArtifact(_))
        ));
    }
}
