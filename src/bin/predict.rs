use housing_boost::data_loader::DataLoader;
use housing_boost::predictor::Predictor;
use housing_boost::Config;
use tracing::{debug, info, instrument};

#[instrument]
fn main() -> Result<(), housing_boost::BoxError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Starting housing price predictor");

    let config_path = "config.toml";
    debug!("Loading config from path: {}", config_path);
    let config = Config::load(config_path)?;
    debug!(?config, "Config loaded successfully");

    // Load the unlabeled inference data
    let loader = DataLoader::new(
        &config.data.predict_path,
        &config.data.id_column,
        &config.data.label_column,
        &config.data.missing_sentinel,
    );
    let (ids, raw_features) = loader.load_inference()?;
    debug!(
        rows = raw_features.height(),
        columns = raw_features.width(),
        "Inference frame loaded"
    );

    let predictor = Predictor::from_path(&config.data.model_path)?;
    debug!(
        stages = predictor.ensemble().num_stages(),
        "Model artifact loaded"
    );

    info!("Making predictions ...");
    let predictions = predictor.predict_frame(&raw_features)?;
    debug!(predictions_len = predictions.len(), "Predictions complete");

    DataLoader::write_predictions(
        &ids,
        &predictions,
        &config.data.label_column,
        &config.data.predictions_path,
    )?;
    info!("Predictions saved to {}", config.data.predictions_path);

    Ok(())
}
