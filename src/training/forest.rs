//! Random forest of CART trees for binary classification.
//!
//! Trees split on Gini impurity, draw a bootstrap sample each and consider
//! `floor(sqrt(d))` candidate features per split (continuing past that
//! budget only while no valid split has been found). Leaves store the
//! positive-class fraction; the forest averages leaves across trees.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::common::error::{CoreError, CoreResult};

use super::domain::Hyperparams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Flat node arena; node 0 is the root and children always follow their
/// parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    pub fn predict(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = x.get(*feature).copied().unwrap_or(0.0);
                    idx = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            match self.nodes.get(idx) {
                Some(Node::Split { left, right, .. }) if *left > idx && *right > idx => {
                    stack.push((*left, depth + 1));
                    stack.push((*right, depth + 1));
                }
                Some(_) => deepest = deepest.max(depth),
                None => {}
            }
        }
        deepest
    }

    fn validate(&self, n_features: usize) -> CoreResult<()> {
        if self.nodes.is_empty() {
            return Err(CoreError::ArtifactCorrupt("empty decision tree".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } if !(0.0..=1.0).contains(value) => {
                    return Err(CoreError::ArtifactCorrupt(format!(
                        "leaf {idx} holds probability {value}"
                    )));
                }
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } if *feature >= n_features
                    || *left <= idx
                    || *right <= idx
                    || *left >= self.nodes.len()
                    || *right >= self.nodes.len() =>
                {
                    return Err(CoreError::ArtifactCorrupt(format!(
                        "split node {idx} is malformed"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Bagged ensemble of [`DecisionTree`]s.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on the rows of `x`/`y` selected by `rows`. The same inputs and
    /// seed always give the same forest.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        rows: &[usize],
        params: &Hyperparams,
        seed: u64,
    ) -> CoreResult<Self> {
        if rows.is_empty() {
            return Err(CoreError::invalid("cannot fit a forest on zero rows"));
        }
        if x.len() != y.len() {
            return Err(CoreError::invalid(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(CoreError::config("n_estimators must be at least 1"));
        }
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        if x.iter().any(|row| row.len() != n_features) {
            return Err(CoreError::invalid("feature rows have differing widths"));
        }
        if rows.iter().any(|&r| r >= x.len()) {
            return Err(CoreError::invalid("row index out of range"));
        }

        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);
        let mut master = ChaCha8Rng::seed_from_u64(seed);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let mut rng = ChaCha8Rng::seed_from_u64(master.gen());
            let sample: Vec<usize> = (0..rows.len())
                .map(|_| rows[rng.gen_range(0..rows.len())])
                .collect();

            let mut builder = TreeBuilder {
                x,
                y,
                params,
                n_features,
                max_features,
                nodes: Vec::new(),
            };
            builder.build(sample, &mut rng);
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        Ok(Self { n_features, trees })
    }

    /// Mean positive-class probability across trees.
    pub fn predict_proba(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(x)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Structural checks for forests read from disk.
    pub fn validate(&self) -> CoreResult<()> {
        if self.trees.is_empty() {
            return Err(CoreError::ArtifactCorrupt("forest has no trees".to_string()));
        }
        self.trees
            .iter()
            .try_for_each(|tree| tree.validate(self.n_features))
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    params: &'a Hyperparams,
    n_features: usize,
    max_features: usize,
    nodes: Vec<Node>,
}

struct PendingNode {
    samples: Vec<usize>,
    depth: usize,
    node: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    /// Grow a tree over `root` with an explicit work stack. Children are
    /// allocated when their parent splits, so they always follow it.
    fn build(&mut self, root: Vec<usize>, rng: &mut ChaCha8Rng) {
        self.nodes.push(Node::Leaf { value: 0.0 });
        let mut stack = vec![PendingNode {
            samples: root,
            depth: 0,
            node: 0,
        }];

        while let Some(PendingNode {
            samples,
            depth,
            node,
        }) = stack.pop()
        {
            let n = samples.len();
            let positives = samples.iter().filter(|&&i| self.y[i] == 1).count();
            let value = if n == 0 {
                0.0
            } else {
                positives as f64 / n as f64
            };
            self.nodes[node] = Node::Leaf { value };

            let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
            let pure = positives == 0 || positives == n;
            if n < self.params.min_samples_split || depth_reached || pure {
                continue;
            }

            let Some(split) = self.best_split(&samples, positives, rng) else {
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .copied()
                .partition(|&i| self.x[i][split.feature] <= split.threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }

            let left_idx = self.nodes.len();
            let right_idx = left_idx + 1;
            self.nodes.push(Node::Leaf { value: 0.0 });
            self.nodes.push(Node::Leaf { value: 0.0 });
            self.nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_idx,
                right: right_idx,
            };
            stack.push(PendingNode {
                samples: right,
                depth: depth + 1,
                node: right_idx,
            });
            stack.push(PendingNode {
                samples: left,
                depth: depth + 1,
                node: left_idx,
            });
        }
    }

    fn best_split(
        &self,
        samples: &[usize],
        positives: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<usize> = (0..self.n_features).collect();
        order.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        for (visited, &feature) in order.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) = self.best_split_on(feature, samples, positives) {
                if best
                    .as_ref()
                    .map_or(true, |b| candidate.impurity < b.impurity)
                {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Lowest weighted Gini impurity over thresholds of one feature.
    fn best_split_on(
        &self,
        feature: usize,
        samples: &[usize],
        positives: usize,
    ) -> Option<SplitCandidate> {
        if samples.len() < 2 {
            return None;
        }
        let mut pairs: Vec<(f64, u8)> = samples
            .iter()
            .map(|&i| (self.x[i][feature], self.y[i]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len() as f64;
        let mut left_pos = 0usize;
        let mut best: Option<SplitCandidate> = None;

        for i in 0..pairs.len() - 1 {
            left_pos += usize::from(pairs[i].1);
            let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
            if lo >= hi {
                continue;
            }
            let left_n = (i + 1) as f64;
            let right_n = n - left_n;
            let right_pos = (positives - left_pos) as f64;
            let impurity = (left_n * gini(left_pos as f64, left_n)
                + right_n * gini(right_pos, right_n))
                / n;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(positives: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let p = positives / total;
    2.0 * p * (1.0 - p)
}
