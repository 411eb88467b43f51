//! Isolation forest: an ensemble of random partitioning trees.
//!
//! Anomalies are few and different, so random axis-aligned splits isolate
//! them in fewer steps than normal points. The anomaly score of a point is
//! `2^(-E[h(x)] / c(psi))`, where `h(x)` is its path length in one tree, `psi`
//! the per-tree sample size and `c` the average path length of an
//! unsuccessful binary-search-tree lookup. Scores lie in `(0, 1]`; higher is
//! more anomalous.

use crate::error::{PipelineError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Node of an isolation tree, stored in a per-tree arena.
#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &[Vec<f64>], sample: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, sample, 0, height_limit, rng);
        tree
    }

    /// Grow the subtree for `indices`, returning its arena slot.
    fn grow(
        &mut self,
        data: &[Vec<f64>],
        indices: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let slot = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });

        if depth >= height_limit || indices.len() <= 1 {
            return slot;
        }

        let n_features = data[indices[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..n_features)
            .filter_map(|f| {
                let (min, max) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(data[i][f]), hi.max(data[i][f])),
                );
                (max > min).then_some((f, min, max))
            })
            .collect();

        if splittable.is_empty() {
            return slot;
        }

        let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
        let threshold = min + rng.gen::<f64>() * (max - min);

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| data[i][feature] <= threshold);

        let left = self.grow(data, left_idx, depth + 1, height_limit, rng);
        let right = self.grow(data, right_idx, depth + 1, height_limit, rng);
        self.nodes[slot] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        slot
    }

    fn path_length(&self, x: &[f64]) -> f64 {
        let mut slot = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[slot] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    slot = if x[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

/// Average path length of an unsuccessful search in a BST of `n` nodes.
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

/// Seeded isolation forest.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    seed: u64,
    sample_size: usize,
    n_features: usize,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Create an unfitted forest.
    pub fn new(n_estimators: usize, max_samples: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            max_samples,
            seed,
            sample_size: 0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fit the forest on row-major `data` (one row per observation).
    ///
    /// # Errors
    /// [`PipelineError::ModelFit`] for empty, ragged or non-finite input and
    /// for zero estimators.
    pub fn fit(&mut self, data: &[Vec<f64>]) -> Result<()> {
        let n_features = validate_matrix(data)?;
        if self.n_estimators == 0 || self.max_samples == 0 {
            return Err(PipelineError::ModelFit(
                "estimator count and sample size must be positive".to_string(),
            ));
        }

        let sample_size = self.max_samples.min(data.len());
        let height_limit = (sample_size as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, data.len(), sample_size).into_vec();
                IsolationTree::build(data, sample, height_limit, &mut rng)
            })
            .collect();
        self.sample_size = sample_size;
        self.n_features = n_features;
        Ok(())
    }

    /// Anomaly score of every row; higher is more anomalous.
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(PipelineError::ModelFit(
                "isolation forest must be fitted before scoring".to_string(),
            ));
        }
        let n_features = validate_matrix(data)?;
        if n_features != self.n_features {
            return Err(PipelineError::DimensionMismatch {
                expected: self.n_features,
                got: n_features,
            });
        }

        let normalizer = average_path_length(self.sample_size).max(f64::MIN_POSITIVE);
        Ok(data
            .iter()
            .map(|row| {
                let mean_path = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>()
                    / self.trees.len() as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect())
    }
}

fn validate_matrix(data: &[Vec<f64>]) -> Result<usize> {
    let n_features = data.first().map(|r| r.len()).unwrap_or(0);
    if n_features == 0 {
        return Err(PipelineError::ModelFit("feature matrix is empty".to_string()));
    }
    for (i, row) in data.iter().enumerate() {
        if row.len() != n_features {
            return Err(PipelineError::ModelFit(format!(
                "row {} has {} features, expected {}",
                i,
                row.len(),
                n_features
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::ModelFit(format!(
                "row {} contains non-finite values",
                i
            )));
        }
    }
    Ok(n_features)
}
