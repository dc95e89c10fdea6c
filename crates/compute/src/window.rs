//! Fixed-capacity ring buffers advanced one tick at a time.
//!
//! [`RollingWindow`] backs every trailing feature (mean, std, slope, counts)
//! and the alert gate's smoothing buffer. [`PersistenceWindow`] backs the
//! "held at every point of the lookback" rules.

use std::collections::VecDeque;

/// Trailing window over an optional-valued signal.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<Option<f64>>,
    capacity: usize,
    /// Number of `None` entries currently held.
    missing: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            missing: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    /// Append a value, evicting the oldest once at capacity.
    ///
    /// Returns a view only when the window is full and every entry is
    /// defined; otherwise the aggregate is unavailable at this tick.
    pub fn push(&mut self, value: Option<f64>) -> Option<WindowView<'_>> {
        if self.values.len() == self.capacity {
            if let Some(None) = self.values.pop_front() {
                self.missing -= 1;
            }
        }
        let value = value.filter(|v| !v.is_nan());
        if value.is_none() {
            self.missing += 1;
        }
        self.values.push_back(value);
        self.view()
    }

    /// The complete window at the current tick, if any.
    pub fn view(&self) -> Option<WindowView<'_>> {
        (self.is_full() && self.missing == 0).then_some(WindowView {
            values: &self.values,
        })
    }

    /// Mean of whatever defined values the buffer holds, full or not.
    pub fn mean_so_far(&self) -> Option<f64> {
        let n = self.values.iter().flatten().count();
        (n > 0).then(|| compensated_sum(self.values.iter().flatten().copied()) / n as f64)
    }
}

/// Neumaier-compensated sum. A constant window averages back to its value.
fn compensated_sum(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, compensation) = values.fold((0.0_f64, 0.0_f64), |(sum, c), v| {
        let t = sum + v;
        let c = if sum.abs() >= v.abs() {
            c + ((sum - t) + v)
        } else {
            c + ((v - t) + sum)
        };
        (t, c)
    });
    sum + compensation
}

/// Read-only aggregates over a full, gap-free window (oldest first).
#[derive(Debug, Clone, Copy)]
pub struct WindowView<'a> {
    values: &'a VecDeque<Option<f64>>,
}

impl WindowView<'_> {
    fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().flatten().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        compensated_sum(self.iter()) / self.len() as f64
    }

    /// Sample standard deviation (n-1). Zero for a single-entry window.
    pub fn sample_std(&self) -> f64 {
        let n = self.len();
        if n < 2 {
            return 0.0;
        }
        let mean = self.mean();
        let ss: f64 = self.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    }

    /// Ordinary-least-squares slope against the index `0..W`.
    pub fn slope(&self) -> f64 {
        let n = self.len();
        if n < 2 {
            return 0.0;
        }
        let x_mean = (n - 1) as f64 / 2.0;
        let y_mean = self.mean();
        let (num, den) = self
            .iter()
            .enumerate()
            .fold((0.0, 0.0), |(num, den), (i, y)| {
                let dx = i as f64 - x_mean;
                (num + dx * (y - y_mean), den + dx * dx)
            });
        num / den
    }

    pub fn count_below(&self, threshold: f64) -> usize {
        self.iter().filter(|v| *v < threshold).count()
    }
}

/// Tracks whether a condition held at every one of the last `W` ticks.
///
/// The current tick is not part of its own lookback: [`advance`] answers
/// for the `W` ticks before it, then records the current one.
///
/// [`advance`]: PersistenceWindow::advance
#[derive(Debug, Clone)]
pub struct PersistenceWindow {
    held: VecDeque<bool>,
    capacity: usize,
    held_count: usize,
}

impl PersistenceWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            held: VecDeque::with_capacity(capacity),
            capacity,
            held_count: 0,
        }
    }

    /// Whether the condition held throughout the full prior window.
    pub fn persisted(&self) -> bool {
        self.held.len() == self.capacity && self.held_count == self.capacity
    }

    /// Answer for the prior window, then push the current tick.
    pub fn advance(&mut self, holds: bool) -> bool {
        let persisted = self.persisted();
        if self.held.len() == self.capacity && self.held.pop_front() == Some(true) {
            self.held_count -= 1;
        }
        if holds {
            self.held_count += 1;
        }
        self.held.push_back(holds);
        persisted
    }
}
