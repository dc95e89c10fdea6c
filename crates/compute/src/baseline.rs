//! Baseline statistics store: per-column mean and sample standard deviation
//! of a reference feature batch, persisted as JSON.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use triage_core::{FeatureFrame, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: IndexMap<String, f64>,
    pub std: IndexMap<String, f64>,
}

impl BaselineStats {
    /// Fit on every column of the frame. Columns with fewer than two defined
    /// values have no sample std and are skipped.
    pub fn fit(frame: &FeatureFrame) -> Self {
        let mut stats = Self::default();
        for (name, _) in frame.columns() {
            let (Some(mean), Some(std)) = (frame.mean(name), frame.std(name)) else {
                debug!(column = name, "fewer than two defined values, column skipped");
                continue;
            };
            stats.mean.insert(name.to_string(), mean);
            stats.std.insert(name.to_string(), std);
        }
        info!(rows = frame.len(), columns = stats.mean.len(), "baseline statistics fitted");
        stats
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Write as `{"mean": {...}, "std": {...}}`, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = %path.display(), columns = self.len(), "baseline statistics saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let stats: Self = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), columns = stats.len(), "baseline statistics loaded");
        Ok(stats)
    }
}
