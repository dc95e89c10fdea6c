//! Per-column standardization fitted on the full scored batch.

use triage_core::{Result, TriageError};

/// Zero-mean, unit-variance scaling with population standard deviation.
/// Constant columns keep a scale of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(TriageError::MissingUpstreamArtifact(
                "cannot fit a scaler on an empty batch".to_string(),
            ));
        };
        let dim = first.len();
        let n = rows.len() as f64;

        let mut mean = vec![0.0; dim];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut variance = vec![0.0; dim];
        for row in rows {
            for (i, v) in row.iter().enumerate().take(dim) {
                variance[i] += (v - mean[i]).powi(2);
            }
        }

        let scale = variance
            .iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > 0.0 {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Ok(Self { mean, scale })
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}
