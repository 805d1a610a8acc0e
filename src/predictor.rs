use std::path::Path;

use polars::prelude::DataFrame;
use tracing::debug;

use crate::boosting::GradientBoostedEnsemble;
use crate::data_loader;
use crate::error::{HousingBoostError, Result};
use crate::matrix::FeatureMatrix;
use crate::model::ModelArtifact;

/// Applies a persisted model to new inputs. Pure over the frozen
/// artifact; nothing is mutated.
pub struct Predictor {
    artifact: ModelArtifact,
}

impl Predictor {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            artifact: ModelArtifact::load(path)?,
        })
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Self {
        Self { artifact }
    }

    /// Predicts from a raw feature frame: replays the fitted pipeline,
    /// selects the trained feature columns in their stored order, and
    /// runs the ensemble.
    pub fn predict_frame(&self, features: &DataFrame) -> Result<Vec<f64>> {
        let transformed = self.artifact.pipeline.apply(features)?;
        let selected = transformed
            .select(self.artifact.feature_names.iter().cloned())
            .map_err(|e| {
                HousingBoostError::Data(format!(
                    "input is missing trained feature columns: {}",
                    e
                ))
            })?;
        debug!(rows = selected.height(), "Inference frame encoded");
        let matrix = data_loader::frame_to_matrix(&selected, None)?;
        self.predict(&matrix)
    }

    /// Predicts from an already-encoded matrix.
    pub fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        self.artifact.ensemble.predict(features)
    }

    pub fn ensemble(&self) -> &GradientBoostedEnsemble {
        &self.artifact.ensemble
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boosting::BoostParams;
    use crate::model::ModelArtifact;
    use crate::transform::Pipeline;
    use polars::prelude::*;

    fn trained_predictor() -> Predictor {
        let df = df!(
            "GrLivArea" => ["710", "1262", "1786", "961"],
            "CentralAir" => ["Y", "N", "Y", "Y"],
        )
        .unwrap();
        let (encoded, pipeline) = Pipeline::standard().fit_apply(&df).unwrap();
        let feature_names: Vec<String> = encoded
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let labels = vec![140000.0, 180000.0, 220000.0, 150000.0];
        let matrix = data_loader::frame_to_matrix(&encoded, Some(labels)).unwrap();
        let params = BoostParams {
            num_trees: 10,
            learning_rate: 0.5,
            max_depth: 2,
            ..BoostParams::default()
        };
        let (ensemble, _) =
            GradientBoostedEnsemble::train(&matrix, &params, |_, _| {}).unwrap();
        Predictor::from_artifact(ModelArtifact::new(feature_names, pipeline, ensemble).unwrap())
    }

    #[test]
    fn test_predict_frame_replays_training_encoding() {
        let predictor = trained_predictor();
        let inference = df!(
            "GrLivArea" => ["1000", "1700"],
            "CentralAir" => ["N", "Y"],
        )
        .unwrap();

        let predictions = predictor.predict_frame(&inference).unwrap();
        assert_eq!(predictions.len(), 2);
        for p in predictions {
            assert!(p.is_finite());
        }
    }

    #[test]
    fn test_predict_frame_matches_round_tripped_artifact() {
        let predictor = trained_predictor();
        let file = tempfile::NamedTempFile::new().unwrap();
        predictor.artifact.save(file.path()).unwrap();
        let reloaded = Predictor::from_path(file.path()).unwrap();

        let inference = df!(
            "GrLivArea" => ["850", "1500", "2100"],
            "CentralAir" => ["Y", "N", "Y"],
        )
        .unwrap();
        assert_eq!(
            predictor.predict_frame(&inference).unwrap(),
            reloaded.predict_frame(&inference).unwrap()
        );
    }

    #[test]
    fn test_predict_frame_rejects_missing_columns() {
        let predictor = trained_predictor();
        let inference = df!("GrLivArea" => ["1000"]).unwrap();
        let err = predictor.predict_frame(&inference).unwrap_err();
        assert!(matches!(err, HousingBoostError::Data(_)));
    }

    #[test]
    fn test_predict_frame_rejects_unparseable_numeric() {
        let predictor = trained_predictor();
        let inference = df!(
            "GrLivArea" => ["big"],
            "CentralAir" => ["Y"],
        )
        .unwrap();
        let err = predictor.predict_frame(&inference).unwrap_err();
        assert!(matches!(err, HousingBoostError::Data(_)));
    }
}
