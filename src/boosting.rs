use ndarray::{ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HousingBoostError, Result};
use crate::matrix::FeatureMatrix;
use crate::tree::RegressionTree;

/// Boosting hyperparameters. `subsample_ratio` of exactly 1.0 (the
/// documented default) trains every tree on the full dataset and performs
/// no RNG draws.
#[derive(Debug, Clone, PartialEq)]
pub struct BoostParams {
    pub num_trees: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample_ratio: f64,
    pub seed: u64,
}

impl Default for BoostParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            learning_rate: 0.1,
            max_depth: 4,
            subsample_ratio: 1.0,
            seed: 42,
        }
    }
}

impl BoostParams {
    fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(HousingBoostError::InvalidArgument(
                "num_trees must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(HousingBoostError::InvalidArgument(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 {
            return Err(HousingBoostError::InvalidArgument(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if !(self.subsample_ratio > 0.0 && self.subsample_ratio <= 1.0) {
            return Err(HousingBoostError::InvalidArgument(format!(
                "subsample_ratio must be in (0, 1], got {}",
                self.subsample_ratio
            )));
        }
        Ok(())
    }
}

/// One boosting stage: a tree and the shrinkage weight it was appended
/// with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostStage {
    tree: RegressionTree,
    weight: f64,
}

/// Mean-squared training loss per boosting iteration, in iteration order.
/// Append-only during training, frozen afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossTrace(Vec<f64>);

impl LossTrace {
    fn push(&mut self, loss: f64) {
        self.0.push(loss);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

/// An additive ensemble of shrinkage-weighted regression trees over a
/// scalar bias: `prediction(x) = bias + Σ weight_k · tree_k(x)`.
///
/// Instances only exist in the trained state; `train` consumes its inputs
/// and returns a frozen ensemble, so retraining always constructs a new
/// one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedEnsemble {
    bias: f64,
    num_features: usize,
    stages: Vec<BoostStage>,
}

impl GradientBoostedEnsemble {
    /// Fits `num_trees` trees to the residuals of the running prediction.
    ///
    /// Each iteration recomputes residuals against all rows, fits a tree
    /// on the (optionally subsampled) rows, updates every row's running
    /// prediction by `learning_rate · tree(x)`, records the mean-squared
    /// loss, and reports `(iteration, loss)` to the observer. Exactly
    /// `num_trees` iterations run; there is no early stopping.
    pub fn train<F>(
        data: &FeatureMatrix,
        params: &BoostParams,
        mut observer: F,
    ) -> Result<(Self, LossTrace)>
    where
        F: FnMut(usize, f64),
    {
        params.validate()?;
        let targets = data.labels().ok_or_else(|| {
            HousingBoostError::InvalidArgument("training requires a labeled dataset".to_string())
        })?;

        let n = data.n_rows();
        let bias = targets.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![bias; n];
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut stages = Vec::with_capacity(params.num_trees);
        let mut trace = LossTrace::default();

        for iteration in 0..params.num_trees {
            let residuals: Vec<f64> = targets
                .iter()
                .zip(&predictions)
                .map(|(y, p)| y - p)
                .collect();

            let tree = if params.subsample_ratio < 1.0 {
                // Fresh without-replacement draw every iteration.
                let k = ((params.subsample_ratio * n as f64).round() as usize).max(1);
                let mut rows = rand::seq::index::sample(&mut rng, n, k).into_vec();
                rows.sort_unstable();
                let sub_features = data.features().select(Axis(0), &rows);
                let sub_residuals: Vec<f64> = rows.iter().map(|&i| residuals[i]).collect();
                RegressionTree::fit(sub_features.view(), &sub_residuals, params.max_depth)?
            } else {
                RegressionTree::fit(data.features(), &residuals, params.max_depth)?
            };

            // The prediction update covers all rows, not just the
            // subsample.
            for (i, prediction) in predictions.iter_mut().enumerate() {
                *prediction += params.learning_rate * tree.predict(data.row(i))?;
            }

            let loss = targets
                .iter()
                .zip(&predictions)
                .map(|(y, p)| (y - p) * (y - p))
                .sum::<f64>()
                / n as f64;
            trace.push(loss);
            observer(iteration, loss);
            debug!(iteration, loss, nodes = tree.num_nodes(), "Fit boosting stage");

            stages.push(BoostStage {
                tree,
                weight: params.learning_rate,
            });
        }

        Ok((
            Self {
                bias,
                num_features: data.n_features(),
                stages,
            },
            trace,
        ))
    }

    /// Predicts a single row.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> Result<f64> {
        if row.len() != self.num_features {
            return Err(HousingBoostError::InvalidArgument(format!(
                "row has {} features, ensemble was trained on {}",
                row.len(),
                self.num_features
            )));
        }
        let mut prediction = self.bias;
        for stage in &self.stages {
            prediction += stage.weight * stage.tree.predict(row)?;
        }
        Ok(prediction)
    }

    /// Predicts every row of a matrix, in row order.
    pub fn predict(&self, data: &FeatureMatrix) -> Result<Vec<f64>> {
        (0..data.n_rows())
            .map(|i| self.predict_row(data.row(i)))
            .collect()
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn num_stages(&self) -> usize {
        self.stages.len()
    }

    /// Structural check for deserialized ensembles.
    pub fn validate(&self) -> Result<()> {
        if !self.bias.is_finite() {
            return Err(HousingBoostError::Persistence(
                "ensemble bias is not finite".to_string(),
            ));
        }
        for (idx, stage) in self.stages.iter().enumerate() {
            if !(stage.weight > 0.0) || !stage.weight.is_finite() {
                return Err(HousingBoostError::Persistence(format!(
                    "stage {} has invalid weight {}",
                    idx, stage.weight
                )));
            }
            if stage.tree.num_features() != self.num_features {
                return Err(HousingBoostError::Persistence(format!(
                    "stage {} was fit on {} features, ensemble expects {}",
                    idx,
                    stage.tree.num_features(),
                    self.num_features
                )));
            }
            stage.tree.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worked_example() -> FeatureMatrix {
        FeatureMatrix::from_rows(
            vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]],
            Some(vec![10.0, 20.0, 30.0, 40.0]),
        )
        .unwrap()
    }

    fn separable_dataset() -> FeatureMatrix {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, (i % 5) as f64]).collect();
        let labels: Vec<f64> = (0..20).map(|i| (i as f64) * 3.0 + (i % 5) as f64).collect();
        FeatureMatrix::from_rows(rows, Some(labels)).unwrap()
    }

    #[test]
    fn test_single_tree_worked_example() {
        let params = BoostParams {
            num_trees: 1,
            learning_rate: 1.0,
            max_depth: 1,
            ..BoostParams::default()
        };
        let (ensemble, trace) =
            GradientBoostedEnsemble::train(&worked_example(), &params, |_, _| {}).unwrap();

        assert_eq!(ensemble.bias(), 25.0);
        assert_eq!(ensemble.num_stages(), 1);
        assert_eq!(trace.len(), 1);

        let lo = [1.0];
        let hi = [4.0];
        assert!((ensemble.predict_row(ArrayView1::from(&lo[..])).unwrap() - 15.0).abs() < 1e-12);
        assert!((ensemble.predict_row(ArrayView1::from(&hi[..])).unwrap() - 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_hyperparameters() {
        let data = worked_example();
        let bad = [
            BoostParams {
                num_trees: 0,
                ..BoostParams::default()
            },
            BoostParams {
                learning_rate: 0.0,
                ..BoostParams::default()
            },
            BoostParams {
                learning_rate: -0.1,
                ..BoostParams::default()
            },
            BoostParams {
                max_depth: 0,
                ..BoostParams::default()
            },
            BoostParams {
                subsample_ratio: 0.0,
                ..BoostParams::default()
            },
            BoostParams {
                subsample_ratio: 1.5,
                ..BoostParams::default()
            },
        ];
        for params in bad {
            let err = GradientBoostedEnsemble::train(&data, &params, |_, _| {}).unwrap_err();
            assert!(matches!(err, HousingBoostError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_rejects_unlabeled_dataset() {
        let data = FeatureMatrix::from_rows(vec![vec![1.0], vec![2.0]], None).unwrap();
        let err =
            GradientBoostedEnsemble::train(&data, &BoostParams::default(), |_, _| {}).unwrap_err();
        assert!(matches!(err, HousingBoostError::InvalidArgument(_)));
    }

    #[test]
    fn test_training_is_deterministic() {
        let data = separable_dataset();
        let params = BoostParams {
            num_trees: 12,
            learning_rate: 0.3,
            max_depth: 3,
            subsample_ratio: 0.5,
            seed: 9,
        };
        let (a, trace_a) = GradientBoostedEnsemble::train(&data, &params, |_, _| {}).unwrap();
        let (b, trace_b) = GradientBoostedEnsemble::train(&data, &params, |_, _| {}).unwrap();

        assert_eq!(a, b);
        assert_eq!(trace_a, trace_b);
        assert_eq!(a.predict(&data).unwrap(), b.predict(&data).unwrap());
    }

    #[test]
    fn test_loss_trace_shape_and_monotonicity() {
        let data = separable_dataset();
        let params = BoostParams {
            num_trees: 25,
            learning_rate: 0.5,
            max_depth: 2,
            ..BoostParams::default()
        };
        let (_, trace) = GradientBoostedEnsemble::train(&data, &params, |_, _| {}).unwrap();

        assert_eq!(trace.len(), 25);
        for window in trace.values().windows(2) {
            assert!(window[0] >= 0.0);
            assert!(window[1] <= window[0] + 1e-9);
        }
    }

    #[test]
    fn test_observer_sees_every_iteration() {
        let data = separable_dataset();
        let params = BoostParams {
            num_trees: 5,
            ..BoostParams::default()
        };
        let mut seen = Vec::new();
        let (_, trace) =
            GradientBoostedEnsemble::train(&data, &params, |iteration, loss| {
                seen.push((iteration, loss));
            })
            .unwrap();

        assert_eq!(seen.len(), 5);
        for (i, (iteration, loss)) in seen.iter().enumerate() {
            assert_eq!(*iteration, i);
            assert_eq!(*loss, trace.values()[i]);
        }
    }

    #[test]
    fn test_subsampled_training_still_converges() {
        let data = separable_dataset();
        let params = BoostParams {
            num_trees: 40,
            learning_rate: 0.3,
            max_depth: 3,
            subsample_ratio: 0.75,
            seed: 3,
        };
        let (_, trace) = GradientBoostedEnsemble::train(&data, &params, |_, _| {}).unwrap();

        let first = trace.values()[0];
        let last = *trace.values().last().unwrap();
        assert!(last < first);
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let data = separable_dataset();
        let params = BoostParams {
            num_trees: 8,
            learning_rate: 0.2,
            max_depth: 3,
            ..BoostParams::default()
        };
        let (ensemble, _) = GradientBoostedEnsemble::train(&data, &params, |_, _| {}).unwrap();

        let json = serde_json::to_string(&ensemble).unwrap();
        let restored: GradientBoostedEnsemble = serde_json::from_str(&json).unwrap();

        assert_eq!(ensemble, restored);
        assert_eq!(
            ensemble.predict(&data).unwrap(),
            restored.predict(&data).unwrap()
        );
        restored.validate().unwrap();
    }

    #[test]
    fn test_predict_rejects_wrong_feature_count() {
        let (ensemble, _) = GradientBoostedEnsemble::train(
            &worked_example(),
            &BoostParams {
                num_trees: 1,
                ..BoostParams::default()
            },
            |_, _| {},
        )
        .unwrap();

        let row = [1.0, 2.0];
        let err = ensemble.predict_row(ArrayView1::from(&row[..])).unwrap_err();
        assert!(matches!(err, HousingBoostError::InvalidArgument(_)));
    }
}
