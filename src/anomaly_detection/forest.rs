//! Isolation forest
//!
//! Unsupervised outlier scoring. Each tree recursively splits the full
//! training set on a random feature at a random threshold; points that get
//! isolated after few splits are anomalous. Trees are built once, read-only
//! afterwards, and thrown away when the forest is retrained.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::errors::{AnomalyDetectionError, Result};

/// Euler-Mascheroni constant, truncated to the precision scores are pinned to.
pub const EULER_GAMMA: f64 = 0.5772156649;

/// Average path length of an unsuccessful search in a BST of `n` nodes.
///
/// `c(n) = 2(ln(n-1) + γ) - 2(n-1)/n`, and `0` for `n <= 1`.
pub fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
}

/// Forest construction parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub num_trees: usize,
    pub max_depth: usize,
    /// Sample size whose `c(n)` normalizes scores. Fixed, independent of the
    /// actual training set size.
    pub normalization_size: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 10,
            max_depth: 8,
            normalization_size: 100,
        }
    }
}

/// Isolation tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IsolationNode {
    /// Terminal node holding how many training rows reached it
    Leaf { size: usize },
    /// Rows with `x[feature] < threshold` go left, the rest go right
    Split {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
}

impl IsolationNode {
    fn grow<R: Rng + ?Sized>(
        rows: &[&[f64]],
        depth: usize,
        max_depth: usize,
        dimension: usize,
        rng: &mut R,
    ) -> Self {
        if depth >= max_depth || rows.len() <= 1 {
            return IsolationNode::Leaf { size: rows.len() };
        }

        let feature = rng.gen_range(0..dimension);
        let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), row| {
            (lo.min(row[feature]), hi.max(row[feature]))
        });
        if min == max {
            return IsolationNode::Leaf { size: rows.len() };
        }

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
            rows.iter().copied().partition(|row| row[feature] < threshold);

        IsolationNode::Split {
            feature,
            threshold,
            left: Box::new(Self::grow(&left, depth + 1, max_depth, dimension, rng)),
            right: Box::new(Self::grow(&right, depth + 1, max_depth, dimension, rng)),
        }
    }
}

/// A single randomized partition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Grow a tree over `rows`. Every row must have `dimension` slots.
    pub fn build<R: Rng + ?Sized>(rows: &[&[f64]], max_depth: usize, dimension: usize, rng: &mut R) -> Self {
        Self {
            root: IsolationNode::grow(rows, 0, max_depth, dimension, rng),
        }
    }

    pub fn root(&self) -> &IsolationNode {
        &self.root
    }

    /// Internal nodes traversed to reach `x`'s leaf, plus `c(leaf size)`.
    /// Missing slots read as 0.
    pub fn path_length(&self, x: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut edges = 0.0;
        loop {
            match node {
                IsolationNode::Leaf { size } => return edges + average_path_length(*size),
                IsolationNode::Split { feature, threshold, left, right } => {
                    let value = x.get(*feature).copied().unwrap_or(0.0);
                    node = if value < *threshold { left } else { right };
                    edges += 1.0;
                }
            }
        }
    }

    /// Features split on along `x`'s path, root first.
    pub fn path_features(&self, x: &[f64]) -> Vec<usize> {
        let mut features = Vec::new();
        let mut node = &self.root;
        while let IsolationNode::Split { feature, threshold, left, right } = node {
            features.push(*feature);
            let value = x.get(*feature).copied().unwrap_or(0.0);
            node = if value < *threshold { left } else { right };
        }
        features
    }

    /// Number of split levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(node: &IsolationNode) -> usize {
            match node {
                IsolationNode::Leaf { .. } => 0,
                IsolationNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }

    /// Sum of leaf sizes; equals the training row count.
    pub fn leaf_total(&self) -> usize {
        fn walk(node: &IsolationNode) -> usize {
            match node {
                IsolationNode::Leaf { size } => *size,
                IsolationNode::Split { left, right, .. } => walk(left) + walk(right),
            }
        }
        walk(&self.root)
    }
}

/// Ensemble of isolation trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    params: ForestParams,
    dimension: usize,
    training_size: usize,
}

impl IsolationForest {
    /// Train a new forest over `vectors`.
    ///
    /// Rejects empty, ragged or non-finite input so a bad retrain never
    /// replaces a working forest. Callers enforce their own minimum size.
    pub fn fit<R: Rng + ?Sized>(vectors: &[Vec<f64>], params: ForestParams, rng: &mut R) -> Result<Self> {
        if params.num_trees == 0 || params.max_depth == 0 {
            return Err(AnomalyDetectionError::InvalidTrainingData(
                "forest needs at least one tree of depth >= 1".to_string(),
            ));
        }
        let Some(first) = vectors.first() else {
            return Err(AnomalyDetectionError::InvalidTrainingData(
                "training set is empty".to_string(),
            ));
        };
        let dimension = first.len();
        if dimension == 0 {
            return Err(AnomalyDetectionError::InvalidTrainingData(
                "feature vectors are empty".to_string(),
            ));
        }
        for v in vectors {
            if v.len() != dimension {
                return Err(AnomalyDetectionError::DimensionMismatch {
                    expected: dimension,
                    found: v.len(),
                });
            }
            if v.iter().any(|x| !x.is_finite()) {
                return Err(AnomalyDetectionError::InvalidTrainingData(
                    "feature vector contains a non-finite value".to_string(),
                ));
            }
        }

        let rows: Vec<&[f64]> = vectors.iter().map(Vec::as_slice).collect();
        let trees = (0..params.num_trees)
            .map(|_| IsolationTree::build(&rows, params.max_depth, dimension, rng))
            .collect();

        Ok(Self {
            trees,
            params,
            dimension,
            training_size: vectors.len(),
        })
    }

    /// Anomaly score in (0, 1]. Near 1 means isolated quickly.
    pub fn predict(&self, x: &[f64]) -> f64 {
        let avg = self.average_path_length(x);
        2f64.powf(-avg / average_path_length(self.params.normalization_size))
    }

    /// [`predict`](Self::predict) with a dimension check.
    pub fn try_predict(&self, x: &[f64]) -> Result<f64> {
        if x.len() != self.dimension {
            return Err(AnomalyDetectionError::DimensionMismatch {
                expected: self.dimension,
                found: x.len(),
            });
        }
        Ok(self.predict(x))
    }

    /// Mean path length of `x` across trees.
    pub fn average_path_length(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64
    }

    /// Per-feature share of splits on `x`'s paths, weighted toward splits
    /// near the root. Sums to 1 unless `x` lands in a root leaf everywhere.
    pub fn isolating_features(&self, x: &[f64]) -> Vec<f64> {
        let mut weights = vec![0.0; self.dimension];
        for tree in &self.trees {
            for (level, feature) in tree.path_features(x).into_iter().enumerate() {
                if let Some(w) = weights.get_mut(feature) {
                    *w += 1.0 / (level as f64 + 1.0);
                }
            }
        }
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            weights.iter_mut().for_each(|w| *w /= total);
        }
        weights
    }

    pub fn trees(&self) -> &[IsolationTree] {
        &self.trees
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn training_size(&self) -> usize {
        self.training_size
    }
}
