//! Random forest for binary labels.
//!
//! Bootstrap-sampled Gini trees, a random feature subset per split and a
//! majority vote across trees. Every draw comes from the caller's StageRng.

use crate::{config::ForestConfig, features::Matrix, rng::StageRng};
use ndarray::ArrayView1;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
}

struct TreeBuilder<'a> {
    rows: &'a Matrix,
    labels: &'a [u8],
    config: &'a ForestConfig,
    max_features: usize,
    importances: Vec<f64>,
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

fn majority(positives: usize, total: usize) -> u8 {
    // Ties go to the lower class.
    u8::from(positives * 2 > total)
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: &[usize], depth: usize, rng: &mut StageRng) -> Node {
        let total = indices.len();
        let positives = indices.iter().filter(|&&i| self.labels[i] == 1).count();
        let leaf = Node::Leaf {
            class: majority(positives, total),
        };

        let depth_exhausted = self.config.max_depth.is_some_and(|max| depth >= max);
        if positives == 0
            || positives == total
            || depth_exhausted
            || total < self.config.min_samples_split.max(2)
        {
            return leaf;
        }

        let Some(best) = self.find_split(indices, positives, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.rows[[i, best.feature]] <= best.threshold);

        self.importances[best.feature] += best.gain * total as f64;
        let left = self.build(&left, depth + 1, rng);
        let right = self.build(&right, depth + 1, rng);
        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn find_split(&self, indices: &[usize], positives: usize, rng: &mut StageRng) -> Option<BestSplit> {
        let width = self.rows.ncols();
        let mut features: Vec<usize> = (0..width).collect();
        rng.shuffle(&mut features);
        features.truncate(self.max_features);

        let total = indices.len();
        let parent = gini(positives, total);
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;

        for &feature in &features {
            let mut column: Vec<(f64, u8)> = indices
                .iter()
                .map(|&i| (self.rows[[i, feature]], self.labels[i]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            // Sweep thresholds between consecutive distinct values.
            let mut left_pos = 0usize;
            for split in 1..total {
                left_pos += usize::from(column[split - 1].1 == 1);
                let (lo, hi) = (column[split - 1].0, column[split].0);
                if lo == hi || split < min_leaf || total - split < min_leaf {
                    continue;
                }
                let right_pos = positives - left_pos;
                let weighted = (split as f64 * gini(left_pos, split)
                    + (total - split) as f64 * gini(right_pos, total - split))
                    / total as f64;
                let gain = parent - weighted;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (lo + hi) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

impl DecisionTree {
    fn fit(
        rows: &Matrix,
        labels: &[u8],
        indices: &[usize],
        config: &ForestConfig,
        max_features: usize,
        rng: &mut StageRng,
    ) -> (Self, Vec<f64>) {
        let width = rows.ncols();
        let mut builder = TreeBuilder {
            rows,
            labels,
            config,
            max_features,
            importances: vec![0.0; width],
        };
        let root = builder.build(indices, 0, rng);
        (Self { root }, builder.importances)
    }

    pub fn predict_one(&self, features: ArrayView1<f64>) -> u8 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Train on `rows`/`labels`. Both must be non-empty and the same length.
    pub fn fit(rows: &Matrix, labels: &[u8], config: &ForestConfig, rng: &mut StageRng) -> Self {
        assert_eq!(rows.nrows(), labels.len(), "rows and labels differ in length");
        assert!(rows.nrows() > 0, "cannot train on an empty set");

        let n = rows.nrows();
        let width = rows.ncols();
        let max_features = config
            .max_features
            .unwrap_or_else(|| (width as f64).sqrt().ceil() as usize)
            .clamp(1, width.max(1));

        let mut trees = Vec::with_capacity(config.n_trees);
        let mut importances = vec![0.0; width];
        for _ in 0..config.n_trees {
            let mut tree_rng = rng.fork("forest-tree");
            let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.next_index(n)).collect();
            let (tree, tree_importances) =
                DecisionTree::fit(rows, labels, &bootstrap, config, max_features, &mut tree_rng);
            for (acc, imp) in importances.iter_mut().zip(tree_importances) {
                *acc += imp;
            }
            trees.push(tree);
        }

        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }

        Self {
            trees,
            feature_importances: importances,
        }
    }

    /// Fraction of trees voting for class 1.
    pub fn positive_vote_share(&self, features: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let votes = self
            .trees
            .iter()
            .filter(|t| t.predict_one(features) == 1)
            .count();
        votes as f64 / self.trees.len() as f64
    }

    pub fn predict_one(&self, features: ArrayView1<f64>) -> u8 {
        u8::from(self.positive_vote_share(features) > 0.5)
    }

    pub fn predict(&self, rows: &Matrix) -> Vec<u8> {
        rows.rows().into_iter().map(|r| self.predict_one(r)).collect()
    }

    /// Normalised to sum to 1, or all zero when no tree ever split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}
