//! Isolation forest over fixed-width feature rows.
//!
//! Scores follow the usual `score_samples` convention: `-2^(-E[h(x)] / c(ψ))`
//! where `h` is the isolation depth of `x` in one tree and `ψ` the per-tree
//! sub-sample size. Scores lie in `[-1, 0)`; lower means easier to isolate.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};
use visage_analysis_model::FEATURE_DIM;

pub type Row = [f64; FEATURE_DIM];

const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Forest shape.
#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Upper bound on rows drawn per tree.
    pub max_samples: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
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

/// One tree, nodes stored flat with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn fit(rows: Vec<Row>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut nodes = Vec::new();
        grow(&mut nodes, rows, 0, max_depth, rng);
        Self { nodes }
    }

    fn path_length(&self, x: &Row) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }

    /// Every child index in range and pointing forward, so walks terminate.
    fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { .. } => true,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < FEATURE_DIM
                        && threshold.is_finite()
                        && *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }
}

fn grow(
    nodes: &mut Vec<Node>,
    rows: Vec<Row>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> usize {
    let id = nodes.len();
    nodes.push(Node::Leaf { size: rows.len() });
    if depth >= max_depth || rows.len() <= 1 {
        return id;
    }

    // Only features that still vary inside this node can split it.
    let candidates: Vec<(usize, f64, f64)> = (0..FEATURE_DIM)
        .filter_map(|feature| {
            let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r[feature]), hi.max(r[feature]))
            });
            (hi > lo).then_some((feature, lo, hi))
        })
        .collect();
    if candidates.is_empty() {
        return id;
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left_rows, right_rows): (Vec<Row>, Vec<Row>) =
        rows.into_iter().partition(|r| r[feature] <= threshold);

    let left = grow(nodes, left_rows, depth + 1, max_depth, rng);
    let right = grow(nodes, right_rows, depth + 1, max_depth, rng);
    nodes[id] = Node::Split {
        feature,
        threshold,
        left,
        right,
    };
    id
}

/// Average unsuccessful-search path length in a binary search tree of `n`
/// nodes; normalizes isolation depths.
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

/// A fitted forest. Immutable; scoring takes `&self`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
}

impl IsolationForest {
    /// Fit on `rows`. Returns `None` when there is nothing to fit.
    pub fn fit(rows: &[Row], params: ForestParams, rng: &mut StdRng) -> Option<Self> {
        if rows.is_empty() || params.n_trees == 0 || params.max_samples == 0 {
            return None;
        }
        Some(Self::build(rows, params, rng))
    }

    /// Fit on `count` rows of standard-normal noise drawn from `rng`,
    /// returning the forest with the rows it was fit on.
    pub fn fit_standard_normal(
        count: usize,
        params: ForestParams,
        rng: &mut StdRng,
    ) -> (Self, Vec<Row>) {
        let rows = standard_normal_rows(count, rng);
        let forest = Self::build(&rows, params, rng);
        (forest, rows)
    }

    /// Empty `rows` give single-leaf trees that score everything `-1`.
    fn build(rows: &[Row], params: ForestParams, rng: &mut StdRng) -> Self {
        let sample_size = params.max_samples.min(rows.len());
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees = (0..params.n_trees)
            .map(|_| {
                let picked: Vec<Row> = index::sample(rng, rows.len(), sample_size)
                    .iter()
                    .map(|i| rows[i])
                    .collect();
                IsolationTree::fit(picked, max_depth, rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Outlier score in `[-1, 0)`.
    pub fn score(&self, x: &Row) -> f64 {
        let mean_depth = self.trees.iter().map(|t| t.path_length(x)).sum::<f64>()
            / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return -1.0;
        }
        -(2.0_f64).powf(-mean_depth / norm)
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Structural check for forests that came off disk.
    pub fn is_well_formed(&self) -> bool {
        self.sample_size > 0
            && !self.trees.is_empty()
            && self.trees.iter().all(IsolationTree::is_well_formed)
    }
}

/// Value at the `pct` percentile with linear interpolation between ranks.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// `count` rows of standard-normal noise (Box-Muller).
fn standard_normal_rows(count: usize, rng: &mut StdRng) -> Vec<Row> {
    (0..count)
        .map(|_| {
            std::array::from_fn(|_| {
                let u1: f64 = 1.0 - rng.gen::<f64>();
                let u2: f64 = rng.gen();
                (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
            })
        })
        .collect()
}
