use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::boosting::GradientBoostedEnsemble;
use crate::error::{HousingBoostError, Result};
use crate::transform::FittedPipeline;

pub const FORMAT_VERSION: u32 = 1;

/// The persisted model: the fitted preprocessing pipeline, the encoded
/// feature-column order, and the trained ensemble, bundled so the predict
/// path replays the exact training-time encoding. Serialized as JSON;
/// f64 values survive the round trip bit-for-bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub pipeline: FittedPipeline,
    pub ensemble: GradientBoostedEnsemble,
}

impl ModelArtifact {
    pub fn new(
        feature_names: Vec<String>,
        pipeline: FittedPipeline,
        ensemble: GradientBoostedEnsemble,
    ) -> Result<Self> {
        if feature_names.len() != ensemble.num_features() {
            return Err(HousingBoostError::InvalidArgument(format!(
                "{} feature names for an ensemble trained on {} features",
                feature_names.len(),
                ensemble.num_features()
            )));
        }
        Ok(Self {
            format_version: FORMAT_VERSION,
            feature_names,
            pipeline,
            ensemble,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)
            .map_err(|e| HousingBoostError::Persistence(format!("serialization failed: {}", e)))?;
        fs::write(path.as_ref(), json).map_err(|e| {
            HousingBoostError::Persistence(format!(
                "failed to write {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        debug!(path = %path.as_ref().display(), "Model artifact saved");
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).map_err(|e| {
            HousingBoostError::Persistence(format!(
                "failed to read {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let artifact: Self = serde_json::from_str(&contents)
            .map_err(|e| HousingBoostError::Persistence(format!("corrupt model file: {}", e)))?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(HousingBoostError::Persistence(format!(
                "model format version {} is not supported (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }
        if artifact.feature_names.len() != artifact.ensemble.num_features() {
            return Err(HousingBoostError::Persistence(format!(
                "{} feature names for an ensemble trained on {} features",
                artifact.feature_names.len(),
                artifact.ensemble.num_features()
            )));
        }
        artifact.ensemble.validate()?;

        debug!(
            features = artifact.feature_names.len(),
            stages = artifact.ensemble.num_stages(),
            "Model artifact loaded"
        );
        Ok(artifact)
    }
}
