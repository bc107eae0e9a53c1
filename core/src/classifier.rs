//! Classifier: threshold label plus a random forest trained against it.
//!
//! This stage:
//!   1. Labels each party 1 when payment_ratio >= threshold (0–1 scale)
//!   2. Splits the standardised features train/test with a seeded shuffle
//!   3. Trains a random forest on the training rows
//!   4. Predicts over the entire population, not only the held-out rows
//!
//! No accuracy is reported. predicted_class is a display value scored on
//! the same population it was trained on, not a validated generalisation.

use crate::{
    aggregator::PartyAggregate,
    config::{EngineConfig, ForestConfig},
    error::{EngineError, EngineResult},
    features::{feature_matrix, Matrix, StandardScaler},
    forest::RandomForest,
    rng::StageRng,
};
use ndarray::Axis;

/// 1 iff `ratio >= threshold`. The ratio must be on the 0–1 scale.
pub fn threshold_label(ratio: f64, threshold: f64) -> u8 {
    u8::from(ratio >= threshold)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded shuffle, `ceil(n * test_fraction)` rows held out, at least one
/// row kept for training.
pub fn train_test_split(n: usize, test_fraction: f64, rng: &mut StageRng) -> TrainTestSplit {
    let mut indices: Vec<usize> = (0..n).collect();
    rng.shuffle(&mut indices);
    let test_len = ((n as f64 * test_fraction).ceil() as usize).min(n.saturating_sub(1));
    let train = indices.split_off(test_len);
    TrainTestSplit {
        train,
        test: indices,
    }
}

#[derive(Debug, Clone)]
pub struct ClassificationReport {
    pub train_size: usize,
    pub test_size: usize,
    pub positive_labels: usize,
    pub predicted_positive: usize,
    pub feature_importances: Vec<f64>,
}

pub struct Classifier {
    threshold: f64,
    test_fraction: f64,
    forest: ForestConfig,
}

impl Classifier {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            threshold: config.label_threshold,
            test_fraction: config.test_fraction,
            forest: config.forest.clone(),
        }
    }

    /// Fill `label` and `predicted_class` on every aggregate.
    pub fn classify(
        &self,
        parties: &mut [PartyAggregate],
        split_rng: &mut StageRng,
        forest_rng: &mut StageRng,
    ) -> EngineResult<ClassificationReport> {
        if parties.is_empty() {
            return Err(EngineError::computation("cannot classify an empty population"));
        }

        let labels: Vec<u8> = parties
            .iter()
            .map(|p| threshold_label(p.payment_ratio, self.threshold))
            .collect();
        let (_, scaled) = StandardScaler::fit_transform(&feature_matrix(parties))?;

        let split = train_test_split(parties.len(), self.test_fraction, split_rng);
        let train_rows: Matrix = scaled.select(Axis(0), &split.train);
        let train_labels: Vec<u8> = split.train.iter().map(|&i| labels[i]).collect();

        let forest = RandomForest::fit(&train_rows, &train_labels, &self.forest, forest_rng);
        let predictions = forest.predict(&scaled);

        for ((party, label), predicted) in parties.iter_mut().zip(&labels).zip(&predictions) {
            party.label = Some(*label);
            party.predicted_class = Some(*predicted);
        }

        let report = ClassificationReport {
            train_size: split.train.len(),
            test_size: split.test.len(),
            positive_labels: labels.iter().filter(|&&l| l == 1).count(),
            predicted_positive: predictions.iter().filter(|&&p| p == 1).count(),
            feature_importances: forest.feature_importances().to_vec(),
        };
        log::debug!(
            "Classified {} parties ({} train / {} test, {} trees): {} labelled good, {} predicted good",
            parties.len(),
            report.train_size,
            report.test_size,
            forest.n_trees(),
            report.positive_labels,
            report.predicted_positive
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{RngBank, StageSlot};

    #[test]
    fn label_boundary_is_inclusive() {
        assert_eq!(threshold_label(0.6999, 0.7), 0);
        assert_eq!(threshold_label(0.7, 0.7), 1);
        assert_eq!(threshold_label(1.0, 0.7), 1);
    }

    #[test]
    fn split_holds_out_twenty_percent_rounded_up() {
        let mut rng = RngBank::new(42).for_stage(StageSlot::Split);
        let split = train_test_split(11, 0.2, &mut rng);
        assert_eq!(split.test.len(), 3);
        assert_eq!(split.train.len(), 8);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn single_row_is_kept_for_training() {
        let mut rng = RngBank::new(42).for_stage(StageSlot::Split);
        let split = train_test_split(1, 0.2, &mut rng);
        assert_eq!(split.train, vec![0]);
        assert!(split.test.is_empty());
    }
}
