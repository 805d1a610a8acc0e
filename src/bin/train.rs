use housing_boost::boosting::BoostParams;
use housing_boost::data_loader::{self, DataLoader};
use housing_boost::model::ModelArtifact;
use housing_boost::trainer::Trainer;
use housing_boost::transform::Pipeline;
use housing_boost::Config;
use tracing::{debug, info, instrument};

#[instrument]
fn main() -> Result<(), housing_boost::BoxError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Starting housing price trainer");

    let config_path = "config.toml";
    debug!("Loading config from path: {}", config_path);
    let config = Config::load(config_path)?;
    debug!(?config, "Config loaded successfully");

    // Load the labeled training data
    let loader = DataLoader::new(
        &config.data.train_path,
        &config.data.id_column,
        &config.data.label_column,
        &config.data.missing_sentinel,
    );
    let (_ids, raw_features, labels) = loader.load_training()?;
    debug!(
        rows = raw_features.height(),
        columns = raw_features.width(),
        "Training frame loaded"
    );

    // Fit the preprocessing pipeline and encode the features
    let (encoded, pipeline) = Pipeline::standard().fit_apply(&raw_features)?;
    let feature_names: Vec<String> = encoded
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let dataset = data_loader::frame_to_matrix(&encoded, Some(labels))?;
    info!(
        rows = dataset.n_rows(),
        features = dataset.n_features(),
        "Feature matrix ready"
    );

    // Train with a per-iteration progress observer
    let params = BoostParams {
        num_trees: config.model.num_trees,
        learning_rate: config.model.learning_rate,
        max_depth: config.model.max_depth,
        subsample_ratio: config.model.subsample_ratio,
        seed: config.training.seed,
    };
    info!("Training ...");
    let trainer = Trainer::new(params, config.training.train_ratio);
    let report = trainer.run(&dataset, |iteration, loss| {
        info!(iteration, loss, "Boosting iteration complete");
    })?;

    DataLoader::write_progress(&report.loss_trace, &config.data.progress_path)?;
    info!("Progress saved to {}", config.data.progress_path);

    // Persist the fitted pipeline together with the ensemble
    let artifact = ModelArtifact::new(feature_names, pipeline, report.ensemble)?;
    artifact.save(&config.data.model_path)?;
    info!("Training complete! Model saved as {}", config.data.model_path);

    Ok(())
}
