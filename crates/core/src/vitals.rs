use serde::{Deserialize, Serialize};

/// Column names of a raw vitals batch, in canonical order.
pub const TIME_COLUMN: &str = "time_sec";
pub const HEART_RATE_COLUMN: &str = "heart_rate_bpm";
pub const SPO2_COLUMN: &str = "spo2_percent";
pub const BP_SYSTOLIC_COLUMN: &str = "bp_systolic";
pub const BP_DIASTOLIC_COLUMN: &str = "bp_diastolic";
pub const MOTION_COLUMN: &str = "motion";

pub const VITALS_COLUMNS: [&str; 6] = [
    TIME_COLUMN,
    HEART_RATE_COLUMN,
    SPO2_COLUMN,
    BP_SYSTOLIC_COLUMN,
    BP_DIASTOLIC_COLUMN,
    MOTION_COLUMN,
];

/// One per-second telemetry sample. `None` marks a missing reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalsSample {
    pub time_sec: u64,
    pub heart_rate_bpm: Option<f64>,
    pub spo2_percent: Option<f64>,
    pub bp_systolic: Option<f64>,
    pub bp_diastolic: Option<f64>,
    pub motion: Option<f64>,
}

impl VitalsSample {
    /// A sample with every channel present.
    pub fn complete(
        time_sec: u64,
        heart_rate_bpm: f64,
        spo2_percent: f64,
        bp_systolic: f64,
        bp_diastolic: f64,
        motion: f64,
    ) -> Self {
        Self {
            time_sec,
            heart_rate_bpm: Some(heart_rate_bpm),
            spo2_percent: Some(spo2_percent),
            bp_systolic: Some(bp_systolic),
            bp_diastolic: Some(bp_diastolic),
            motion: Some(motion),
        }
    }

    /// Minutes since the start of the run.
    pub fn time_min(&self) -> f64 {
        self.time_sec as f64 / 60.0
    }

    /// Read a channel by column name. `None` for unknown names and missing values.
    pub fn channel(&self, column: &str) -> Option<f64> {
        match column {
            TIME_COLUMN => Some(self.time_sec as f64),
            HEART_RATE_COLUMN => self.heart_rate_bpm,
            SPO2_COLUMN => self.spo2_percent,
            BP_SYSTOLIC_COLUMN => self.bp_systolic,
            BP_DIASTOLIC_COLUMN => self.bp_diastolic,
            MOTION_COLUMN => self.motion,
            _ => None,
        }
    }
}

/// Vital-sign channels subject to cleaning and windowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    Spo2,
    BpSystolic,
    BpDiastolic,
    Motion,
}

impl Channel {
    pub fn column(self) -> &'static str {
        match self {
            Channel::HeartRate => HEART_RATE_COLUMN,
            Channel::Spo2 => SPO2_COLUMN,
            Channel::BpSystolic => BP_SYSTOLIC_COLUMN,
            Channel::BpDiastolic => BP_DIASTOLIC_COLUMN,
            Channel::Motion => MOTION_COLUMN,
        }
    }

    pub fn get(self, sample: &VitalsSample) -> Option<f64> {
        match self {
            Channel::HeartRate => sample.heart_rate_bpm,
            Channel::Spo2 => sample.spo2_percent,
            Channel::BpSystolic => sample.bp_systolic,
            Channel::BpDiastolic => sample.bp_diastolic,
            Channel::Motion => sample.motion,
        }
    }

    pub fn set(self, sample: &mut VitalsSample, value: Option<f64>) {
        let slot = match self {
            Channel::HeartRate => &mut sample.heart_rate_bpm,
            Channel::Spo2 => &mut sample.spo2_percent,
            Channel::BpSystolic => &mut sample.bp_systolic,
            Channel::BpDiastolic => &mut sample.bp_diastolic,
            Channel::Motion => &mut sample.motion,
        };
        *slot = value.filter(|v| !v.is_nan());
    }

    /// Extract the whole channel as a column.
    pub fn series(self, samples: &[VitalsSample]) -> Vec<Option<f64>> {
        samples.iter().map(|s| self.get(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_lookup_by_column() {
        let s = VitalsSample::complete(90, 80.0, 97.0, 120.0, 80.0, 0.2);
        assert_eq!(s.channel("heart_rate_bpm"), Some(80.0));
        assert_eq!(s.channel("time_sec"), Some(90.0));
        assert_eq!(s.channel("unknown"), None);
        assert!((s.time_min() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn set_treats_nan_as_missing() {
        let mut s = VitalsSample::complete(0, 80.0, 97.0, 120.0, 80.0, 0.2);
        Channel::Spo2.set(&mut s, Some(f64::NAN));
        assert_eq!(s.spo2_percent, None);
        Channel::HeartRate.set(&mut s, Some(101.0));
        assert_eq!(Channel::HeartRate.get(&s), Some(101.0));
    }
}
