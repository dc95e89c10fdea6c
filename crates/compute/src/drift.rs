//! Distribution drift between a feature batch and the stored baseline.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use triage_core::{FeatureFrame, Result};

use crate::baseline::BaselineStats;

/// Added to the baseline std so a zero-variance column cannot divide by zero.
const STD_EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriftReport {
    /// Columns whose z-score exceeds the threshold, in frame order.
    pub drifted: Vec<String>,
    /// z-score of every column present in both the frame and the baseline.
    pub z_scores: IndexMap<String, f64>,
    pub threshold: f64,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.drifted.is_empty()
    }
}

/// Compare each column's batch mean with the baseline mean.
///
/// `z = |mean - baseline.mean| / (baseline.std + 1e-8)`; a column drifts when
/// `z > threshold`. Columns absent from either side, or with no defined
/// values in the batch, are ignored.
pub fn detect_drift(frame: &FeatureFrame, stats: &BaselineStats, threshold: f64) -> DriftReport {
    let mut report = DriftReport {
        threshold,
        ..DriftReport::default()
    };
    for (name, _) in frame.columns() {
        let Some(&base_mean) = stats.mean.get(name) else {
            continue;
        };
        let Some(mean) = frame.mean(name) else {
            debug!(column = name, "no defined values, drift check skipped");
            continue;
        };
        let std = stats.std.get(name).copied().unwrap_or(0.0);
        let z = (mean - base_mean).abs() / (std + STD_EPSILON);
        if z > threshold {
            report.drifted.push(name.to_string());
        }
        report.z_scores.insert(name.to_string(), z);
    }

    if report.has_drift() {
        warn!(drifted = ?report.drifted, threshold, "drift detected");
    } else {
        info!(columns = report.z_scores.len(), threshold, "no significant drift detected");
    }
    report
}

/// Copy of the frame with one column multiplied by `factor`, for checking
/// that the monitor notices a synthetic shift.
pub fn inject_drift(frame: &FeatureFrame, column: &str, factor: f64) -> Result<FeatureFrame> {
    frame.map_column(column, |v| v * factor)
}
