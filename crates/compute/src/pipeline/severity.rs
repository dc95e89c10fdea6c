//! Rule-based severity detection over the feature batch.
//!
//! HR and BP rules require their slope condition at every row of the full
//! lookback preceding the current row; SpO2 is judged on the current row's
//! persistence count. Flags fuse into a level from 0 to 3.

use tracing::debug;

use triage_rules::detection_config::CompiledDetectionConfig;

use crate::window::PersistenceWindow;

use super::types::{FeatureVector, SeverityReason, SeverityRecord};

/// Stateful detector; evaluate rows strictly in time order.
pub struct SeverityDetector {
    config: CompiledDetectionConfig,
    hr_persist: PersistenceWindow,
    bp_persist: PersistenceWindow,
}

impl SeverityDetector {
    pub fn new(config: &CompiledDetectionConfig) -> Self {
        Self {
            hr_persist: PersistenceWindow::new(config.heart_rate.persist_rows),
            bp_persist: PersistenceWindow::new(config.bp_systolic.persist_rows),
            config: config.clone(),
        }
    }

    pub fn push(&mut self, f: &FeatureVector) -> SeverityRecord {
        let hr_rising = self.hr_persist.advance(self.config.heart_rate.holds(f.hr_slope_30s));
        let bp_falling = self.bp_persist.advance(self.config.bp_systolic.holds(f.sys_bp_slope_60s));

        let spo2 = &self.config.spo2;
        let below = f.spo2_seconds_below_94;
        let spo2_anomaly = (f.spo2_delta_from_baseline < spo2.delta_threshold
            && below >= spo2.fast_persist_seconds)
            || below >= spo2.slow_persist_seconds;

        fuse(hr_rising && !f.high_motion, spo2_anomaly, bp_falling)
    }

    pub fn detect(config: &CompiledDetectionConfig, features: &[FeatureVector]) -> Vec<SeverityRecord> {
        let mut detector = Self::new(config);
        let records: Vec<SeverityRecord> = features.iter().map(|f| detector.push(f)).collect();
        debug!(
            rows = records.len(),
            level_1 = records.iter().filter(|r| r.anomaly_level == 1).count(),
            level_2 = records.iter().filter(|r| r.anomaly_level == 2).count(),
            level_3 = records.iter().filter(|r| r.anomaly_level == 3).count(),
            "severity detection complete"
        );
        records
    }
}

/// Tiered fusion. Each tier is a superset condition of the previous one, so
/// the highest matching tier wins.
pub fn fuse(hr_anomaly: bool, spo2_anomaly: bool, bp_anomaly: bool) -> SeverityRecord {
    let (anomaly_level, reason) = match (hr_anomaly, spo2_anomaly, bp_anomaly) {
        (true, true, true) => (3, SeverityReason::FullDeterioration),
        (true, true, false) => (2, SeverityReason::HrRiseSpo2Drop),
        (true, false, _) => (1, SeverityReason::HrRisingTrend),
        (false, _, _) => (0, SeverityReason::Normal),
    };
    SeverityRecord {
        hr_anomaly,
        spo2_anomaly,
        bp_anomaly,
        anomaly_level,
        reason,
    }
}
