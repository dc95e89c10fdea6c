//! Ordered, named numeric columns.
//!
//! The common currency between the pipeline, the baseline store and the
//! drift monitor. Missing cells are stored as `NaN` and skipped by every
//! aggregate.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    columns: IndexMap<String, Vec<f64>>,
    rows: usize,
}

impl FeatureFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column. The first column fixes the row count; later columns
    /// of a different length are rejected.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        if self.columns.is_empty() {
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(TriageError::StageMismatch {
                stage: "feature_frame",
                expected: self.rows,
                actual: values.len(),
            });
        }
        self.columns.insert(name.into(), values);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Like [`get`](Self::get), but a missing column is a schema error.
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.get(name).ok_or_else(|| TriageError::SchemaMismatch {
            column: name.to_string(),
        })
    }

    /// Mean of the defined values of a column, or `None` if it has none.
    pub fn mean(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(nan_mean)
    }

    /// Sample standard deviation (n-1) of the defined values of a column.
    pub fn std(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(nan_sample_std)
    }

    /// Return a copy with one column transformed; used for drift injection.
    pub fn map_column(&self, name: &str, f: impl Fn(f64) -> f64) -> Result<Self> {
        let mut out = self.clone();
        let col = out
            .columns
            .get_mut(name)
            .ok_or_else(|| TriageError::SchemaMismatch {
                column: name.to_string(),
            })?;
        for v in col.iter_mut() {
            *v = f(*v);
        }
        Ok(out)
    }
}

/// Mean ignoring `NaN`.
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Sample standard deviation ignoring `NaN`. Undefined below two values.
pub fn nan_sample_std(values: &[f64]) -> Option<f64> {
    let mean = nan_mean(values)?;
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.len() < 2 {
        return None;
    }
    let var = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (defined.len() - 1) as f64;
    Some(var.sqrt())
}
