use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ndarray::Array2;
use tracing::debug;

use crate::boosting::LossTrace;
use crate::error::HousingBoostError;
use crate::matrix::FeatureMatrix;

/// DataLoader handles CSV ingestion and column bookkeeping for the
/// housing dataset.
pub struct DataLoader {
    path: PathBuf,
    id_column: String,
    label_column: String,
    missing_sentinel: String,
}

impl DataLoader {
    /// Creates a new DataLoader for a CSV file. Cells equal to the
    /// missing sentinel (e.g. "NA") are read as nulls.
    pub fn new<P: AsRef<Path>>(
        path: P,
        id_column: &str,
        label_column: &str,
        missing_sentinel: &str,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            id_column: id_column.to_string(),
            label_column: label_column.to_string(),
            missing_sentinel: missing_sentinel.to_string(),
        }
    }

    fn read_frame(&self) -> Result<DataFrame> {
        debug!("Reading CSV file: {}", self.path.display());
        let df = LazyCsvReader::new(&self.path)
            .with_has_header(true)
            .with_null_values(Some(NullValues::AllColumnsSingle(
                self.missing_sentinel.clone().into(),
            )))
            .finish()
            .with_context(|| format!("Failed to open {}", self.path.display()))?
            .collect()
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        debug!(shape = ?df.shape(), "CSV loaded");
        Ok(df)
    }

    /// Loads a labeled training frame: returns the identifier series, the
    /// raw feature frame (identifier and label columns removed) and the
    /// label vector.
    pub fn load_training(&self) -> Result<(Series, DataFrame, Vec<f64>)> {
        let df = self.read_frame()?;

        let ids = df
            .column(&self.id_column)
            .with_context(|| format!("Missing identifier column '{}'", self.id_column))?
            .as_materialized_series()
            .clone();

        let labels = df
            .column(&self.label_column)
            .with_context(|| format!("Missing label column '{}'", self.label_column))?
            .as_materialized_series()
            .cast(&DataType::Float64)
            .context("Label column is not numeric")?;
        let labels: Vec<f64> = labels
            .f64()?
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                value.ok_or_else(|| {
                    HousingBoostError::Data(format!("row {} has a missing label", i))
                })
            })
            .collect::<std::result::Result<_, _>>()?;

        let features = df.drop(&self.id_column)?.drop(&self.label_column)?;
        Ok((ids, features, labels))
    }

    /// Loads an unlabeled inference frame: returns the identifier series
    /// and the raw feature frame, in input order.
    pub fn load_inference(&self) -> Result<(Series, DataFrame)> {
        let df = self.read_frame()?;

        let ids = df
            .column(&self.id_column)
            .with_context(|| format!("Missing identifier column '{}'", self.id_column))?
            .as_materialized_series()
            .clone();

        let mut features = df.drop(&self.id_column)?;
        // A label column in the inference file is ignored, not predicted
        // from.
        if features.column(&self.label_column).is_ok() {
            features = features.drop(&self.label_column)?;
        }
        Ok((ids, features))
    }

    /// Writes the per-iteration loss trace as a single-column CSV.
    pub fn write_progress<P: AsRef<Path>>(trace: &LossTrace, path: P) -> Result<()> {
        let mut df = DataFrame::new(vec![
            Series::new("loss".into(), trace.values().to_vec()).into_column()
        ])?;
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)
            .context("Failed to write progress CSV")?;
        Ok(())
    }

    /// Writes predictions as (identifier, predicted value) rows, in input
    /// order.
    pub fn write_predictions<P: AsRef<Path>>(
        ids: &Series,
        predictions: &[f64],
        label_column: &str,
        path: P,
    ) -> Result<()> {
        let mut df = DataFrame::new(vec![
            ids.clone().into_column(),
            Series::new(label_column.into(), predictions.to_vec()).into_column(),
        ])?;
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create {}", path.as_ref().display()))?;
        CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)
            .context("Failed to write predictions CSV")?;
        Ok(())
    }
}

/// Converts an all-numeric frame into a row-major FeatureMatrix. Any
/// remaining non-numeric column or null cell is a data error.
pub fn frame_to_matrix(
    df: &DataFrame,
    labels: Option<Vec<f64>>,
) -> std::result::Result<FeatureMatrix, HousingBoostError> {
    let n_rows = df.height();
    let n_cols = df.width();

    // Collect column-major, then transpose into the row-major layout the
    // trees consume.
    let mut column_values: Vec<Vec<f64>> = Vec::with_capacity(n_cols);
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        let casted = series.cast(&DataType::Float64).map_err(|_| {
            HousingBoostError::Data(format!(
                "column '{}' is not numeric after preprocessing",
                series.name()
            ))
        })?;
        let values: Vec<f64> = casted
            .f64()?
            .into_iter()
            .map(|value| {
                value.ok_or_else(|| {
                    HousingBoostError::Data(format!(
                        "column '{}' contains a missing value after preprocessing",
                        series.name()
                    ))
                })
            })
            .collect::<std::result::Result<_, _>>()?;
        column_values.push(values);
    }

    let mut values = Vec::with_capacity(n_rows * n_cols);
    for row in 0..n_rows {
        for column in column_values.iter() {
            values.push(column[row]);
        }
    }
    let features = Array2::from_shape_vec((n_rows, n_cols), values)
        .map_err(|e| HousingBoostError::InvalidArgument(e.to_string()))?;

    FeatureMatrix::from_parts(features, labels)
}
