//! Motion-artifact filter applied to raw vitals before feature extraction.
//!
//! Three steps, per run:
//! 1. Bounded linear interpolation of HR, SpO2 and both BP channels.
//! 2. A centred rolling median of HR and SpO2 as the local reference.
//! 3. Under high motion, HR spikes and false SpO2 drops are replaced by
//!    that reference.

use serde::Serialize;
use tracing::info;

use triage_core::{Channel, VitalsSample};
use triage_rules::feature_config::ArtifactFilterParams;

/// Counts of what the filter changed in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    pub interpolated: usize,
    pub hr_suppressed: usize,
    pub spo2_suppressed: usize,
}

pub struct ArtifactFilter {
    params: ArtifactFilterParams,
}

impl ArtifactFilter {
    pub fn new(params: ArtifactFilterParams) -> Self {
        Self { params }
    }

    pub fn clean(&self, samples: &[VitalsSample]) -> (Vec<VitalsSample>, ArtifactReport) {
        let mut out = samples.to_vec();
        let mut report = ArtifactReport::default();

        for channel in [
            Channel::HeartRate,
            Channel::Spo2,
            Channel::BpSystolic,
            Channel::BpDiastolic,
        ] {
            let mut series = channel.series(&out);
            report.interpolated += interpolate_limited(&mut series, self.params.interpolate_limit);
            for (sample, value) in out.iter_mut().zip(series) {
                channel.set(sample, value);
            }
        }

        let hr = Channel::HeartRate.series(&out);
        let spo2 = Channel::Spo2.series(&out);
        let hr_median = centered_median(&hr, self.params.median_window);
        let spo2_median = centered_median(&spo2, self.params.median_window);

        for (i, sample) in out.iter_mut().enumerate() {
            let moving = sample
                .motion
                .is_some_and(|m| m > self.params.motion_threshold);
            if !moving {
                continue;
            }
            if let (Some(v), Some(med)) = (hr[i], hr_median[i]) {
                if (v - med).abs() > self.params.hr_spike_threshold {
                    sample.heart_rate_bpm = Some(med);
                    report.hr_suppressed += 1;
                }
            }
            if let (Some(v), Some(med)) = (spo2[i], spo2_median[i]) {
                if med - v > self.params.spo2_drop_threshold {
                    sample.spo2_percent = Some(med);
                    report.spo2_suppressed += 1;
                }
            }
        }

        info!(
            samples = samples.len(),
            interpolated = report.interpolated,
            hr_suppressed = report.hr_suppressed,
            spo2_suppressed = report.spo2_suppressed,
            "artifact filter applied"
        );
        (out, report)
    }
}

/// Fill gaps forward from the last defined value, at most `limit` per gap.
///
/// Interior gaps are filled on the straight line between their endpoints;
/// trailing gaps repeat the last value; leading gaps stay missing. Returns
/// the number of filled entries.
pub fn interpolate_limited(series: &mut [Option<f64>], limit: usize) -> usize {
    let mut filled = 0;
    let mut last: Option<(usize, f64)> = None;
    let mut i = 0;

    while i < series.len() {
        match series[i] {
            Some(v) => {
                last = Some((i, v));
                i += 1;
            }
            None => {
                let start = i;
                while i < series.len() && series[i].is_none() {
                    i += 1;
                }
                let Some((left_idx, left)) = last else {
                    continue;
                };
                let next = series.get(i).copied().flatten();
                let end = (start + limit).min(i);
                for (j, slot) in series.iter_mut().enumerate().take(end).skip(start) {
                    *slot = Some(match next {
                        Some(right) => {
                            let t = (j - left_idx) as f64 / (i - left_idx) as f64;
                            left + t * (right - left)
                        }
                        None => left,
                    });
                    filled += 1;
                }
            }
        }
    }
    filled
}

/// Centred rolling median. Undefined near either edge or when the window
/// holds a missing value.
pub fn centered_median(series: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;
    (0..series.len())
        .map(|i| {
            if window == 0 || i < half || i + (window - half) > series.len() {
                return None;
            }
            let mut vals: Vec<f64> = series[i - half..i - half + window]
                .iter()
                .copied()
                .collect::<Option<Vec<f64>>>()?;
            vals.sort_by(f64::total_cmp);
            let mid = vals.len() / 2;
            Some(if vals.len() % 2 == 1 {
                vals[mid]
            } else {
                (vals[mid - 1] + vals[mid]) / 2.0
            })
        })
        .collect()
}
