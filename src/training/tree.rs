//! CART regression tree used by the ensemble estimators.
//!
//! Splits minimise the summed squared error of the two children. Candidate
//! thresholds are the midpoints between consecutive distinct values of a
//! feature, evaluated in one sorted sweep with running sums.

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Growth limits of a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features considered at each split; all of them when `None`
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `rows`.
    ///
    /// `rows` may contain repeats (bootstrap samples). `rng` is only drawn
    /// from when `params.max_features` restricts the candidate features.
    pub fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        params: &TreeParams,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let root = grow(x, y, rows, 0, params, rng);
        Self { root }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    node = if value <= *threshold { left } else { right };
                }
            }
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }

    pub fn depth(&self) -> usize {
        fn depth_of(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        depth_of(&self.root)
    }
}

fn mean(y: &Array1<f64>, rows: &[usize]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64
}

fn grow(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    depth: usize,
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> TreeNode {
    let leaf = || TreeNode::Leaf {
        value: mean(y, rows),
    };

    if rows.len() < params.min_samples_split
        || rows.len() < 2 * params.min_samples_leaf
        || params.max_depth.is_some_and(|d| depth >= d)
    {
        return leaf();
    }

    let Some(best) = best_split(x, y, rows, params, rng) else {
        return leaf();
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&i| x[[i, best.feature]] <= best.threshold);

    TreeNode::Split {
        feature: best.feature,
        threshold: best.threshold,
        left: Box::new(grow(x, y, &left_rows, depth + 1, params, rng)),
        right: Box::new(grow(x, y, &right_rows, depth + 1, params, rng)),
    }
}

fn best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    params: &TreeParams,
    rng: &mut ChaCha8Rng,
) -> Option<BestSplit> {
    let n_features = x.ncols();
    let features: Vec<usize> = match params.max_features {
        Some(k) if k > 0 && k < n_features => sample(rng, n_features, k).into_vec(),
        _ => (0..n_features).collect(),
    };

    let n = rows.len() as f64;
    let total_sum: f64 = rows.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = rows.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n;

    let mut best: Option<BestSplit> = None;
    let mut sorted = rows.to_vec();

    for feature in features {
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for (pos, pair) in sorted.windows(2).enumerate() {
            let (current, next) = (pair[0], pair[1]);
            let yi = y[current];
            left_sum += yi;
            left_sq += yi * yi;

            let left_n = pos + 1;
            let right_n = sorted.len() - left_n;
            if left_n < params.min_samples_leaf || right_n < params.min_samples_leaf {
                continue;
            }

            let (here, there) = (x[[current, feature]], x[[next, feature]]);
            if here >= there {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / left_n as f64;
            let right_sse = right_sq - right_sum * right_sum / right_n as f64;
            let gain = parent_sse - left_sse - right_sse;

            if gain > 1e-12 && best.as_ref().is_none_or(|b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (here + there) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
