use tracing::info;

use crate::boosting::{BoostParams, GradientBoostedEnsemble, LossTrace};
use crate::error::{HousingBoostError, Result};
use crate::matrix::FeatureMatrix;
use crate::metrics::{self, EvalMetrics};

/// Everything a training run produces: the frozen ensemble, the
/// per-iteration loss trace, and the held-out evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub ensemble: GradientBoostedEnsemble,
    pub loss_trace: LossTrace,
    pub holdout: EvalMetrics,
}

/// Thin sequencing layer: shuffle, split, train, evaluate. All the
/// algorithmic work happens inside the ensemble.
pub struct Trainer {
    params: BoostParams,
    train_ratio: f64,
}

impl Trainer {
    pub fn new(params: BoostParams, train_ratio: f64) -> Self {
        Self {
            params,
            train_ratio,
        }
    }

    /// Runs the full training sequence on a labeled dataset. The observer
    /// is invoked once per boosting iteration with `(iteration, loss)`.
    pub fn run<F>(&self, dataset: &FeatureMatrix, observer: F) -> Result<TrainingReport>
    where
        F: FnMut(usize, f64),
    {
        let shuffled = dataset.shuffle(self.params.seed);
        let (train, test) = shuffled.split(self.train_ratio)?;
        info!(
            train_rows = train.n_rows(),
            test_rows = test.n_rows(),
            "Dataset shuffled and split"
        );

        let (ensemble, loss_trace) =
            GradientBoostedEnsemble::train(&train, &self.params, observer)?;

        let predictions = ensemble.predict(&test)?;
        let actuals = test.labels().ok_or_else(|| {
            HousingBoostError::InvalidArgument("training requires a labeled dataset".to_string())
        })?;
        let holdout = metrics::evaluate(&predictions, actuals)?;
        info!(
            mae = holdout.mae,
            rmse = holdout.rmse,
            r_squared = holdout.r_squared,
            "Held-out evaluation complete"
        );

        Ok(TrainingReport {
            ensemble,
            loss_trace,
            holdout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_dataset() -> FeatureMatrix {
        // Labels are a noiseless function of the features, so a boosted
        // model generalizes to the held-out rows.
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 10) as f64, (i / 10) as f64])
            .collect();
        let labels: Vec<f64> = rows.iter().map(|r| 50.0 + 10.0 * r[0] + 5.0 * r[1]).collect();
        FeatureMatrix::from_rows(rows, Some(labels)).unwrap()
    }

    #[test]
    fn test_run_produces_full_report() {
        let params = BoostParams {
            num_trees: 30,
            learning_rate: 0.3,
            max_depth: 3,
            ..BoostParams::default()
        };
        let trainer = Trainer::new(params, 0.8);
        let report = trainer.run(&synthetic_dataset(), |_, _| {}).unwrap();

        assert_eq!(report.loss_trace.len(), 30);
        assert_eq!(report.ensemble.num_stages(), 30);
        assert!(report.holdout.mae.is_finite());
        assert!(report.holdout.rmse >= report.holdout.mae);
    }

    #[test]
    fn test_run_is_deterministic() {
        let params = BoostParams {
            num_trees: 10,
            learning_rate: 0.3,
            max_depth: 3,
            seed: 17,
            ..BoostParams::default()
        };
        let dataset = synthetic_dataset();
        let a = Trainer::new(params.clone(), 0.8).run(&dataset, |_, _| {}).unwrap();
        let b = Trainer::new(params, 0.8).run(&dataset, |_, _| {}).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_run_rejects_bad_split_ratio() {
        let trainer = Trainer::new(BoostParams::default(), 1.2);
        let err = trainer.run(&synthetic_dataset(), |_, _| {}).unwrap_err();
        assert!(matches!(err, HousingBoostError::InvalidArgument(_)));
    }
}
