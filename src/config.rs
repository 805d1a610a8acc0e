use serde::Deserialize;
use std::fs;
use std::path::Path;
use crate::BoxError;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub data: DataParams,
    pub model: ModelParams,
    pub training: TrainingParams,
}

#[derive(Debug, Deserialize)]
pub struct DataParams {
    pub train_path: String,
    pub predict_path: String,
    pub model_path: String,
    pub progress_path: String,
    pub predictions_path: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_label_column")]
    pub label_column: String,
    #[serde(default = "default_missing_sentinel")]
    pub missing_sentinel: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelParams {
    pub num_trees: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    #[serde(default = "default_subsample_ratio")]
    pub subsample_ratio: f64,
}

#[derive(Debug, Deserialize)]
pub struct TrainingParams {
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    pub seed: u64,
}

fn default_id_column() -> String {
    "Id".to_string()
}

fn default_label_column() -> String {
    "SalePrice".to_string()
}

fn default_missing_sentinel() -> String {
    "NA".to_string()
}

fn default_subsample_ratio() -> f64 {
    1.0
}

fn default_train_ratio() -> f64 {
    0.8
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BoxError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [data]
            train_path = "data/train.csv"
            predict_path = "data/unknown.csv"
            model_path = "housing.model"
            progress_path = "progress.csv"
            predictions_path = "predictions.csv"
            id_column = "Id"
            label_column = "SalePrice"
            missing_sentinel = "NA"

            [model]
            num_trees = 100
            learning_rate = 0.1
            max_depth = 4
            subsample_ratio = 0.5

            [training]
            train_ratio = 0.75
            seed = 7
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.data.train_path, "data/train.csv");
        assert_eq!(config.model.num_trees, 100);
        assert_eq!(config.model.subsample_ratio, 0.5);
        assert_eq!(config.training.train_ratio, 0.75);
        assert_eq!(config.training.seed, 7);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let raw = r#"
            [data]
            train_path = "train.csv"
            predict_path = "unknown.csv"
            model_path = "housing.model"
            progress_path = "progress.csv"
            predictions_path = "predictions.csv"

            [model]
            num_trees = 50
            learning_rate = 0.1
            max_depth = 4

            [training]
            seed = 42
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.data.id_column, "Id");
        assert_eq!(config.data.label_column, "SalePrice");
        assert_eq!(config.data.missing_sentinel, "NA");
        assert_eq!(config.model.subsample_ratio, 1.0);
        assert_eq!(config.training.train_ratio, 0.8);
    }
}
