use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const FEATURE_COUNT: usize = 5;
pub const TREE_COUNT: usize = 100;
pub const MAX_DEPTH: usize = 10;
pub const RANDOM_SEED: u64 = 42;

const MIN_SAMPLES_SPLIT: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
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

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    rows: &'a [[f64; FEATURE_COUNT]],
    labels: &'a [f64],
    nodes: Vec<Node>,
    importances: [f64; FEATURE_COUNT],
}

impl<'a> TreeBuilder<'a> {
    fn new(rows: &'a [[f64; FEATURE_COUNT]], labels: &'a [f64]) -> Self {
        Self {
            rows,
            labels,
            nodes: Vec::new(),
            importances: [0.0; FEATURE_COUNT],
        }
    }

    fn leaf(&mut self, value: f64) -> usize {
        self.nodes.push(Node::Leaf { value });
        self.nodes.len() - 1
    }

    fn grow(&mut self, samples: &[usize], depth: usize) -> usize {
        let n = samples.len() as f64;
        let sum: f64 = samples.iter().map(|&i| self.labels[i]).sum();
        let mean = sum / n;

        if depth >= MAX_DEPTH || samples.len() < MIN_SAMPLES_SPLIT {
            return self.leaf(mean);
        }

        let sum_sq: f64 = samples.iter().map(|&i| self.labels[i] * self.labels[i]).sum();
        let parent_sse = sum_sq - sum * sum / n;
        if parent_sse <= 1e-12 {
            return self.leaf(mean);
        }

        // Exhaustive best split over all features, variance-reduction
        // criterion. No feature subsampling: regression forests randomize
        // through the bootstrap only.
        let mut best: Option<(usize, f64, f64)> = None;
        for feature in 0..FEATURE_COUNT {
            let mut ordered: Vec<(f64, f64)> = samples
                .iter()
                .map(|&i| (self.rows[i][feature], self.labels[i]))
                .collect();
            ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for split in 0..ordered.len() - 1 {
                let (value, label) = ordered[split];
                left_sum += label;
                left_sq += label * label;

                let next_value = ordered[split + 1].0;
                if next_value <= value {
                    continue;
                }

                let left_n = (split + 1) as f64;
                let right_n = n - left_n;
                let right_sum = sum - left_sum;
                let right_sq = sum_sq - left_sq;
                let child_sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);

                if best.map_or(true, |(_, _, sse)| child_sse < sse) {
                    best = Some((feature, (value + next_value) / 2.0, child_sse));
                }
            }
        }

        match best {
            None => self.leaf(mean),
            Some((feature, threshold, child_sse)) => {
                self.importances[feature] += parent_sse - child_sse;

                let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                    .iter()
                    .copied()
                    .partition(|&i| self.rows[i][feature] <= threshold);

                let index = self.nodes.len();
                self.nodes.push(Node::Leaf { value: mean });
                let left = self.grow(&left_samples, depth + 1);
                let right = self.grow(&right_samples, depth + 1);
                self.nodes[index] = Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                };
                index
            }
        }
    }
}

/// Bagged regression-tree ensemble over the five financial features.
/// Persistable as a single serde blob; immutable once fitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreModel {
    trees: Vec<Tree>,
    importances: [f64; FEATURE_COUNT],
    oob_score: f64,
    trained_on: usize,
}

impl ScoreModel {
    pub fn fit(rows: &[[f64; FEATURE_COUNT]], labels: &[f64]) -> Option<ScoreModel> {
        if rows.is_empty() || rows.len() != labels.len() {
            return None;
        }

        let n = rows.len();
        let mut rng = StdRng::seed_from_u64(RANDOM_SEED);
        let mut trees = Vec::with_capacity(TREE_COUNT);
        let mut importances = [0.0; FEATURE_COUNT];
        let mut oob_sum = vec![0.0; n];
        let mut oob_count = vec![0usize; n];

        for _ in 0..TREE_COUNT {
            let samples: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut in_bag = vec![false; n];
            for &i in &samples {
                in_bag[i] = true;
            }

            let mut builder = TreeBuilder::new(rows, labels);
            builder.grow(&samples, 0);

            let tree = Tree {
                nodes: builder.nodes,
            };
            for i in 0..n {
                if !in_bag[i] {
                    oob_sum[i] += tree.predict(&rows[i]);
                    oob_count[i] += 1;
                }
            }
            for feature in 0..FEATURE_COUNT {
                importances[feature] += builder.importances[feature];
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for weight in importances.iter_mut() {
                *weight /= total;
            }
        } else {
            // Pure-leaf forest (e.g. constant labels): no splits to attribute,
            // fall back to uniform weights.
            importances = [1.0 / FEATURE_COUNT as f64; FEATURE_COUNT];
        }

        Some(ScoreModel {
            trees,
            importances,
            oob_score: oob_r2(labels, &oob_sum, &oob_count),
            trained_on: n,
        })
    }

    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.predict(features)).sum();
        total / self.trees.len() as f64
    }

    /// Individual ensemble-member predictions, in tree order.
    pub fn tree_predictions(&self, features: &[f64; FEATURE_COUNT]) -> Vec<f64> {
        self.trees.iter().map(|tree| tree.predict(features)).collect()
    }

    /// Population standard deviation of the per-tree predictions, used as the
    /// uncertainty proxy behind the accuracy heuristic.
    pub fn dispersion(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        let predictions = self.tree_predictions(features);
        let mean = predictions.iter().sum::<f64>() / predictions.len() as f64;
        let variance = predictions
            .iter()
            .map(|p| (p - mean) * (p - mean))
            .sum::<f64>()
            / predictions.len() as f64;
        variance.sqrt()
    }

    /// Normalized impurity-decrease importances, one per feature, summing to 1.
    pub fn importances(&self) -> &[f64; FEATURE_COUNT] {
        &self.importances
    }

    /// Out-of-bag R², the trainer's self-reported accuracy proxy.
    pub fn oob_score(&self) -> f64 {
        self.oob_score
    }

    pub fn trained_on(&self) -> usize {
        self.trained_on
    }
}

fn oob_r2(labels: &[f64], oob_sum: &[f64], oob_count: &[usize]) -> f64 {
    let covered: Vec<usize> = (0..labels.len()).filter(|&i| oob_count[i] > 0).collect();
    if covered.is_empty() {
        return 0.0;
    }

    let mean = covered.iter().map(|&i| labels[i]).sum::<f64>() / covered.len() as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for &i in &covered {
        let prediction = oob_sum[i] / oob_count[i] as f64;
        ss_res += (labels[i] - prediction) * (labels[i] - prediction);
        ss_tot += (labels[i] - mean) * (labels[i] - mean);
    }

    if ss_tot <= 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}
