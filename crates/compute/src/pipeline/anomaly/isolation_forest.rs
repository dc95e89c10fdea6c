//! Isolation forest: density-style outlier estimator.
//!
//! Random axis-aligned splits isolate unusual rows in fewer steps. The raw
//! score is `2^(-E[h(x)] / c(ψ))`, where `h` is the path length (with the
//! unresolved-leaf correction) and `c(ψ)` the mean path length of an
//! unsuccessful BST search over the subsample size. Higher is more anomalous.

use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use triage_core::{Result, TriageError};
use triage_rules::scoring_config::IsolationForestParams;

use super::OutlierEstimator;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    params: IsolationForestParams,
    trees: Vec<Node>,
    subsample: usize,
}

impl IsolationForest {
    pub fn new(params: IsolationForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            subsample: 0,
        }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| tree_path(t, row, 0)).sum();
        total / self.trees.len() as f64
    }
}

impl OutlierEstimator for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn fit(&mut self, normal_rows: &[Vec<f64>]) -> Result<()> {
        if normal_rows.is_empty() {
            return Err(TriageError::MissingUpstreamArtifact(
                "isolation forest needs at least one normal row".to_string(),
            ));
        }
        let n = normal_rows.len();
        let subsample = self.params.max_samples.min(n).max(1);
        let height_limit = (subsample as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);

        self.trees = (0..self.params.n_estimators.max(1))
            .map(|_| {
                let idx = sample(&mut rng, n, subsample).into_vec();
                build(normal_rows, idx, 0, height_limit, &mut rng)
            })
            .collect();
        self.subsample = subsample;

        debug!(
            trees = self.trees.len(),
            subsample,
            height_limit,
            "isolation forest fitted"
        );
        Ok(())
    }

    fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(TriageError::MissingUpstreamArtifact(
                "isolation forest scored before fit".to_string(),
            ));
        }
        let c = average_path_length(self.subsample);
        Ok(rows
            .par_iter()
            .map(|row| {
                let h = self.path_length(row);
                if c > 0.0 {
                    2f64.powf(-h / c)
                } else {
                    1.0
                }
            })
            .collect())
    }
}

fn build(rows: &[Vec<f64>], idx: Vec<usize>, depth: usize, limit: usize, rng: &mut ChaCha8Rng) -> Node {
    if depth >= limit || idx.len() <= 1 {
        return Node::Leaf { size: idx.len() };
    }

    let dim = rows[idx[0]].len();
    let splittable: Vec<(usize, f64, f64)> = (0..dim)
        .filter_map(|f| {
            let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = rows[i][f];
                (lo.min(v), hi.max(v))
            });
            (hi > lo).then_some((f, lo, hi))
        })
        .collect();

    if splittable.is_empty() {
        return Node::Leaf { size: idx.len() };
    }

    let (feature, lo, hi) = splittable[rng.gen_range(0..splittable.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) = idx.into_iter().partition(|&i| rows[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build(rows, left, depth + 1, limit, rng)),
        right: Box::new(build(rows, right, depth + 1, limit, rng)),
    }
}

fn tree_path(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                tree_path(left, row, depth + 1)
            } else {
                tree_path(right, row, depth + 1)
            }
        }
    }
}

/// `c(n)`: average path length of an unsuccessful search in a BST of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
