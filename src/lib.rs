pub mod boosting;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod predictor;
pub mod trainer;
pub mod transform;
pub mod tree;

pub use boosting::{BoostParams, GradientBoostedEnsemble, LossTrace};
pub use config::Config;
pub use data_loader::DataLoader;
pub use error::HousingBoostError;
pub use matrix::FeatureMatrix;
pub use model::ModelArtifact;
pub use predictor::Predictor;
pub use trainer::{Trainer, TrainingReport};
pub use tree::RegressionTree;

pub type BoxError = Box<dyn std::error::Error>;
