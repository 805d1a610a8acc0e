use crate::error::{HousingBoostError, Result};

/// Held-out evaluation summary for a trained model.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalMetrics {
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    pub r_squared: f64,
}

/// Computes MAE, MSE, RMSE and R² over parallel prediction/actual slices.
pub fn evaluate(predictions: &[f64], actuals: &[f64]) -> Result<EvalMetrics> {
    if predictions.len() != actuals.len() {
        return Err(HousingBoostError::InvalidArgument(format!(
            "{} predictions for {} actuals",
            predictions.len(),
            actuals.len()
        )));
    }
    if predictions.is_empty() {
        return Err(HousingBoostError::Data(
            "cannot evaluate an empty prediction set".to_string(),
        ));
    }

    let n = predictions.len() as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    for (p, y) in predictions.iter().zip(actuals) {
        abs_sum += (y - p).abs();
        sq_sum += (y - p) * (y - p);
    }
    let mae = abs_sum / n;
    let mse = sq_sum / n;

    let mean = actuals.iter().sum::<f64>() / n;
    let ss_tot: f64 = actuals.iter().map(|y| (y - mean) * (y - mean)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - sq_sum / ss_tot } else { 0.0 };

    Ok(EvalMetrics {
        mae,
        mse,
        rmse: mse.sqrt(),
        r_squared,
    })
}
