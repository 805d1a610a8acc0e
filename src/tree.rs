use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{HousingBoostError, Result};

/// A single node in the tree arena. Children of a split are indices into
/// the owning tree's node vector, which keeps the tree a strict binary
/// ownership tree and makes serialization a plain list dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A regression tree fit with variance-reduction splits. Immutable once
/// fit; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    num_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Fits a tree to `(features, targets)` by recursively choosing the
    /// split with the largest variance reduction
    /// `parent_sse - (left_sse + right_sse)`. Candidate thresholds are the
    /// sorted unique feature values at the node; rows with
    /// `x[feature] <= threshold` go left. Ties resolve to the lowest
    /// feature index, then the lowest threshold. Growth stops at
    /// `max_depth`, below two rows, or when all targets at the node are
    /// equal; the leaf value is the target mean.
    pub fn fit(features: ArrayView2<f64>, targets: &[f64], max_depth: usize) -> Result<Self> {
        if max_depth == 0 {
            return Err(HousingBoostError::InvalidArgument(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if features.nrows() != targets.len() {
            return Err(HousingBoostError::InvalidArgument(format!(
                "{} rows but {} targets",
                features.nrows(),
                targets.len()
            )));
        }
        if targets.is_empty() {
            return Err(HousingBoostError::Data(
                "cannot fit a tree on an empty dataset".to_string(),
            ));
        }

        let mut tree = Self {
            nodes: Vec::new(),
            num_features: features.ncols(),
        };
        let indices: Vec<usize> = (0..targets.len()).collect();
        tree.grow(features, targets, indices, 0, max_depth);
        Ok(tree)
    }

    fn grow(
        &mut self,
        features: ArrayView2<f64>,
        targets: &[f64],
        indices: Vec<usize>,
        depth: usize,
        max_depth: usize,
    ) -> usize {
        let n = indices.len() as f64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &i in &indices {
            sum += targets[i];
            min = min.min(targets[i]);
            max = max.max(targets[i]);
        }
        let mean = sum / n;

        // A node with zero target variance is always a leaf, regardless
        // of remaining depth.
        if depth >= max_depth || indices.len() < 2 || min == max {
            let idx = self.nodes.len();
            self.nodes.push(TreeNode::Leaf { value: mean });
            return idx;
        }

        let split = match find_best_split(features, targets, &indices) {
            Some(split) => split,
            None => {
                let idx = self.nodes.len();
                self.nodes.push(TreeNode::Leaf { value: mean });
                return idx;
            }
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| features[[i, split.feature]] <= split.threshold);

        // Reserve the slot so children always carry larger indices than
        // their parent.
        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: mean });
        let left = self.grow(features, targets, left_rows, depth + 1, max_depth);
        let right = self.grow(features, targets, right_rows, depth + 1, max_depth);
        self.nodes[idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Routes a row from the root to a leaf and returns the leaf value.
    pub fn predict(&self, row: ArrayView1<f64>) -> Result<f64> {
        if row.len() != self.num_features {
            return Err(HousingBoostError::InvalidArgument(format!(
                "row has {} features, tree was fit on {}",
                row.len(),
                self.num_features
            )));
        }

        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return Ok(*value),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Structural check for deserialized trees: split features must be in
    /// range and child indices must point forward into the arena, which
    /// rules out cycles and out-of-bounds descent.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(HousingBoostError::Persistence(
                "tree has no nodes".to_string(),
            ));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } = node
            {
                if *feature >= self.num_features {
                    return Err(HousingBoostError::Persistence(format!(
                        "node {} splits on feature {} but the tree has {} features",
                        idx, feature, self.num_features
                    )));
                }
                if !threshold.is_finite() {
                    return Err(HousingBoostError::Persistence(format!(
                        "node {} has a non-finite threshold",
                        idx
                    )));
                }
                if *left <= idx || *right <= idx || *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(HousingBoostError::Persistence(format!(
                        "node {} has invalid child indices {}/{}",
                        idx, left, right
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Scans every feature with a prefix-sum sweep over rows sorted by that
/// feature. Returns `None` when no feature has two distinct values.
fn find_best_split(
    features: ArrayView2<f64>,
    targets: &[f64],
    indices: &[usize],
) -> Option<BestSplit> {
    let n = indices.len() as f64;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for &i in indices {
        sum += targets[i];
        sum_sq += targets[i] * targets[i];
    }
    let parent_sse = sum_sq - sum * sum / n;

    let mut best: Option<BestSplit> = None;
    let mut order = indices.to_vec();

    for feature in 0..features.ncols() {
        order.sort_by(|&a, &b| features[[a, feature]].total_cmp(&features[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sum_sq = 0.0;
        for pos in 0..order.len() - 1 {
            let y = targets[order[pos]];
            left_sum += y;
            left_sum_sq += y * y;

            let here = features[[order[pos], feature]];
            let next = features[[order[pos + 1], feature]];
            if here == next {
                continue;
            }

            let n_left = (pos + 1) as f64;
            let n_right = n - n_left;
            let right_sum = sum - left_sum;
            let right_sum_sq = sum_sq - left_sum_sq;
            let left_sse = left_sum_sq - left_sum * left_sum / n_left;
            let right_sse = right_sum_sq - right_sum * right_sum / n_right;
            let score = parent_sse - (left_sse + right_sse);

            // Strict improvement over an ascending (feature, threshold)
            // scan realizes the lowest-feature, lowest-threshold tie-break.
            let improves = match &best {
                None => true,
                Some(best) => score > best.score,
            };
            if improves {
                best = Some(BestSplit {
                    feature,
                    threshold: here,
                    score,
                });
            }
        }
    }

    best
}
