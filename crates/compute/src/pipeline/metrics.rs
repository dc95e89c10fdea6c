use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

/// Per-run pipeline metrics, filled in stage by stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetrics {
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the last stage finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Raw samples received.
    pub samples_in: usize,
    /// Rows emitted by feature extraction.
    pub rows_out: usize,
    /// Wall-clock duration of each stage in milliseconds, in execution order.
    pub stage_ms: IndexMap<String, f64>,
    /// Rows emitted by each stage.
    pub stage_rows: IndexMap<String, usize>,
}

impl PipelineMetrics {
    pub fn start(samples_in: usize) -> Self {
        Self {
            started_at: Some(Utc::now()),
            samples_in,
            ..Self::default()
        }
    }

    /// Record completion of one stage.
    pub fn record_stage(&mut self, stage: &str, rows: usize, elapsed: Duration) {
        self.stage_ms.insert(stage.to_owned(), elapsed.as_secs_f64() * 1000.0);
        self.stage_rows.insert(stage.to_owned(), rows);
    }

    pub fn finish(&mut self, rows_out: usize) {
        self.rows_out = rows_out;
        self.finished_at = Some(Utc::now());
    }

    /// Sum of all recorded stage durations.
    pub fn total_ms(&self) -> f64 {
        self.stage_ms.values().sum()
    }

    /// Create a scoped timer for one stage.
    pub fn stage_timer(&self, stage: &'static str) -> StageTimer {
        StageTimer {
            stage,
            start: Instant::now(),
        }
    }
}

/// A scoped timer for one pipeline stage.
pub struct StageTimer {
    stage: &'static str,
    start: Instant,
}

impl StageTimer {
    /// Finalize the timer and record metrics.
    pub fn finish(self, metrics: &mut PipelineMetrics, rows: usize) {
        metrics.record_stage(self.stage, rows, self.start.elapsed());
    }
}
