//! Seeded synthetic ambulance run: a normal phase, a distress phase with
//! rising HR, falling SpO2 and BP, and a recovery phase. Vehicle bumps add
//! motion artifacts and a few sensor dropouts blank every vital but motion.

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use triage_core::{Result, TriageError, VitalsSample};

#[derive(Debug, Clone)]
pub struct SyntheticRun {
    pub seed: u64,
    /// Length of each of the three phases, in seconds.
    pub phase_seconds: usize,
    /// Samples blanked as sensor dropouts.
    pub dropouts: usize,
}

impl Default for SyntheticRun {
    fn default() -> Self {
        Self {
            seed: 42,
            phase_seconds: 600,
            dropouts: 40,
        }
    }
}

fn ramp(from: f64, to: f64, i: usize, len: usize) -> f64 {
    if len <= 1 {
        return from;
    }
    from + (to - from) * i as f64 / (len - 1) as f64
}

fn gaussian(mean: f64, std: f64) -> Result<Normal<f64>> {
    Normal::new(mean, std).map_err(|e| TriageError::Config(format!("normal({mean}, {std}): {e}")))
}

/// Per-channel noise (HR, SpO2, systolic, diastolic).
fn channel_noise(std: [f64; 4]) -> Result<[Normal<f64>; 4]> {
    Ok([
        gaussian(0.0, std[0])?,
        gaussian(0.0, std[1])?,
        gaussian(0.0, std[2])?,
        gaussian(0.0, std[3])?,
    ])
}

impl SyntheticRun {
    pub fn generate(&self) -> Result<Vec<VitalsSample>> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let p = self.phase_seconds;
        let total = p * 3;

        let resting_motion = gaussian(0.2, 0.05)?;
        let distress_motion = gaussian(0.3, 0.1)?;
        let mut motion: Vec<f64> = (0..total).map(|_| resting_motion.sample(&mut rng)).collect();
        let mut t = p / 2;
        while t < total {
            let bump = rng.gen_range(0.6..1.0);
            for m in motion.iter_mut().skip(t).take(5) {
                *m += bump;
            }
            t += 180;
        }
        for m in motion.iter_mut().skip(p).take(p) {
            *m += distress_motion.sample(&mut rng);
        }
        for m in &mut motion {
            *m = m.max(0.0);
        }

        let hr_gain = rng.gen_range(5.0..10.0);
        let spo2_artifact = rng.gen_range(3.0..8.0);

        let noise = [
            channel_noise([3.0, 0.5, 5.0, 4.0])?,
            channel_noise([4.0, 0.7, 6.0, 5.0])?,
            channel_noise([3.0, 0.5, 4.0, 3.0])?,
        ];

        let mut samples: Vec<VitalsSample> = (0..total)
            .map(|i| {
                let (phase, k) = (i / p, i % p);
                let base = match phase {
                    0 => [75.0, 98.0, 120.0, 80.0],
                    1 => [
                        ramp(85.0, 120.0, k, p),
                        ramp(96.0, 90.0, k, p),
                        ramp(125.0, 95.0, k, p),
                        ramp(85.0, 60.0, k, p),
                    ],
                    _ => [
                        ramp(100.0, 80.0, k, p),
                        ramp(92.0, 97.0, k, p),
                        ramp(100.0, 118.0, k, p),
                        ramp(65.0, 78.0, k, p),
                    ],
                };
                let [hr, spo2, sys, dia]: [f64; 4] =
                    std::array::from_fn(|c| base[c] + noise[phase][c].sample(&mut rng));
                let m = motion[i];
                let spo2 = if m > 0.7 { spo2 - spo2_artifact } else { spo2 };
                VitalsSample::complete(
                    i as u64,
                    hr + m * hr_gain,
                    spo2.clamp(75.0, 100.0),
                    sys,
                    dia,
                    m,
                )
            })
            .collect();

        for idx in sample(&mut rng, total, self.dropouts.min(total)).into_iter() {
            let s = &mut samples[idx];
            s.heart_rate_bpm = None;
            s.spo2_percent = None;
            s.bp_systolic = None;
            s.bp_diastolic = None;
        }

        info!(seed = self.seed, samples = total, dropouts = self.dropouts, "synthetic run generated");
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_run() {
        let run = SyntheticRun::default();
        assert_eq!(run.generate().unwrap(), run.generate().unwrap());
        assert_eq!(run.generate().unwrap().len(), 1800);
    }

    #[test]
    fn distress_phase_deteriorates() {
        let samples = SyntheticRun {
            dropouts: 0,
            ..SyntheticRun::default()
        }
        .generate()
        .unwrap();
        let mean = |range: std::ops::Range<usize>, f: fn(&VitalsSample) -> Option<f64>| {
            let vals: Vec<f64> = samples[range].iter().filter_map(f).collect();
            vals.iter().sum::<f64>() / vals.len() as f64
        };
        assert!(mean(1000..1200, |s| s.heart_rate_bpm) > mean(0..600, |s| s.heart_rate_bpm) + 20.0);
        assert!(mean(1000..1200, |s| s.spo2_percent) < mean(0..600, |s| s.spo2_percent) - 4.0);
    }

    #[test]
    fn stable_phase_noise_matches_configured_spread() {
        let samples = SyntheticRun {
            dropouts: 0,
            ..SyntheticRun::default()
        }
        .generate()
        .unwrap();
        // Before the first vehicle bump at 300 s.
        let spo2: Vec<f64> = samples[..290].iter().filter_map(|s| s.spo2_percent).collect();
        let mean = spo2.iter().sum::<f64>() / spo2.len() as f64;
        let std = (spo2.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (spo2.len() - 1) as f64).sqrt();
        assert!((mean - 98.0).abs() < 0.2, "mean {mean}");
        assert!((0.35..0.65).contains(&std), "std {std}");
    }

    #[test]
    fn dropouts_blank_vitals_but_keep_motion() {
        let samples = SyntheticRun::default().generate().unwrap();
        let blanked: Vec<&VitalsSample> = samples.iter().filter(|s| s.heart_rate_bpm.is_none()).collect();
        assert_eq!(blanked.len(), 40);
        assert!(blanked.iter().all(|s| s.spo2_percent.is_none() && s.motion.is_some()));
    }
}
