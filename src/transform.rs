use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HousingBoostError, Result};

/// Preprocessing step variants. This is a closed set with explicit
/// fit/apply operations rather than open-ended dynamic dispatch: a step is
/// fit against the training frame once and the fitted state replays the
/// same mapping against any later frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformer {
    /// Casts numeric columns to f64 and converts string columns whose
    /// non-null cells all parse as numbers.
    NumericConvert,
    /// Fills numeric nulls with the training-column mean and string nulls
    /// with the most frequent training value.
    Impute,
    /// Expands each remaining string column into one 0/1 column per
    /// training-time category.
    OneHotEncode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedTransform {
    NumericConvert { numeric_columns: Vec<String> },
    Impute { fills: Vec<ColumnFill> },
    OneHotEncode { categories: Vec<ColumnCategories> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFill {
    pub column: String,
    pub fill: FillValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FillValue {
    Mean(f64),
    MostFrequent(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCategories {
    pub column: String,
    pub categories: Vec<String>,
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
    )
}

impl Transformer {
    pub fn fit(&self, df: &DataFrame) -> Result<FittedTransform> {
        match self {
            Transformer::NumericConvert => fit_numeric_convert(df),
            Transformer::Impute => fit_impute(df),
            Transformer::OneHotEncode => fit_one_hot(df),
        }
    }
}

impl FittedTransform {
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            FittedTransform::NumericConvert { numeric_columns } => {
                apply_numeric_convert(df, numeric_columns)
            }
            FittedTransform::Impute { fills } => apply_impute(df, fills),
            FittedTransform::OneHotEncode { categories } => apply_one_hot(df, categories),
        }
    }
}

fn fit_numeric_convert(df: &DataFrame) -> Result<FittedTransform> {
    let mut numeric_columns = Vec::new();
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if is_numeric_dtype(series.dtype()) {
            numeric_columns.push(series.name().to_string());
        } else if series.dtype() == &DataType::String {
            // A non-strict cast turns unparseable cells into nulls; the
            // column counts as numeric only when no new nulls appear.
            let casted = series.cast(&DataType::Float64)?;
            if casted.null_count() == series.null_count() {
                numeric_columns.push(series.name().to_string());
            }
        }
    }
    debug!(columns = numeric_columns.len(), "Fit numeric conversion");
    Ok(FittedTransform::NumericConvert { numeric_columns })
}

fn apply_numeric_convert(df: &DataFrame, numeric_columns: &[String]) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if numeric_columns.iter().any(|c| c == series.name().as_str()) {
            let casted = series.cast(&DataType::Float64)?;
            if casted.null_count() > series.null_count() {
                return Err(HousingBoostError::Data(format!(
                    "column '{}' contains a non-numeric value",
                    series.name()
                )));
            }
            columns.push(casted.into_column());
        } else {
            columns.push(col.clone());
        }
    }
    Ok(DataFrame::new(columns)?)
}

fn fit_impute(df: &DataFrame) -> Result<FittedTransform> {
    let mut fills = Vec::new();
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if is_numeric_dtype(series.dtype()) {
            let mean = series.cast(&DataType::Float64)?.mean().ok_or_else(|| {
                HousingBoostError::Data(format!(
                    "column '{}' has no values to impute from",
                    series.name()
                ))
            })?;
            fills.push(ColumnFill {
                column: series.name().to_string(),
                fill: FillValue::Mean(mean),
            });
        } else if series.dtype() == &DataType::String {
            fills.push(ColumnFill {
                column: series.name().to_string(),
                fill: FillValue::MostFrequent(most_frequent(series)?),
            });
        }
    }
    Ok(FittedTransform::Impute { fills })
}

/// Most frequent non-null value; ties break to the lexicographically
/// smallest.
fn most_frequent(series: &Series) -> Result<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in series.str()?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(value, count)| (count, std::cmp::Reverse(value)))
        .map(|(value, _)| value.to_string())
        .ok_or_else(|| {
            HousingBoostError::Data(format!(
                "column '{}' has no values to impute from",
                series.name()
            ))
        })
}

fn apply_impute(df: &DataFrame, fills: &[ColumnFill]) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(df.width());
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        let fill = fills.iter().find(|f| f.column == series.name().as_str());
        match fill {
            Some(ColumnFill {
                fill: FillValue::Mean(mean),
                ..
            }) => {
                let casted = series.cast(&DataType::Float64)?;
                let filled: Float64Chunked = casted
                    .f64()?
                    .into_iter()
                    .map(|value| Some(value.unwrap_or(*mean)))
                    .collect();
                columns.push(filled.into_series().with_name(series.name().clone()).into_column());
            }
            Some(ColumnFill {
                fill: FillValue::MostFrequent(mode),
                ..
            }) => {
                let casted = series.cast(&DataType::String)?;
                let filled: StringChunked = casted
                    .str()?
                    .into_iter()
                    .map(|value| Some(value.unwrap_or(mode.as_str()).to_string()))
                    .collect();
                columns.push(filled.into_series().with_name(series.name().clone()).into_column());
            }
            None => columns.push(col.clone()),
        }
    }
    Ok(DataFrame::new(columns)?)
}

fn fit_one_hot(df: &DataFrame) -> Result<FittedTransform> {
    let mut categories = Vec::new();
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        if series.dtype() != &DataType::String {
            continue;
        }
        let unique: BTreeSet<String> = series
            .str()?
            .into_iter()
            .flatten()
            .map(|v| v.to_string())
            .collect();
        categories.push(ColumnCategories {
            column: series.name().to_string(),
            categories: unique.into_iter().collect(),
        });
    }
    debug!(columns = categories.len(), "Fit one-hot encoding");
    Ok(FittedTransform::OneHotEncode { categories })
}

fn apply_one_hot(df: &DataFrame, categories: &[ColumnCategories]) -> Result<DataFrame> {
    let mut columns = Vec::new();
    for col in df.get_columns() {
        let series = col.as_materialized_series();
        let fitted = categories.iter().find(|c| c.column == series.name().as_str());
        match fitted {
            Some(fitted) => {
                let casted = series.cast(&DataType::String)?;
                let values: Vec<Option<String>> = casted
                    .str()?
                    .into_iter()
                    .map(|v| v.map(|v| v.to_string()))
                    .collect();
                // A value outside the fitted categories encodes as
                // all-zeros across the expanded columns.
                for category in &fitted.categories {
                    let indicator: Vec<f64> = values
                        .iter()
                        .map(|value| match value {
                            Some(value) if value == category => 1.0,
                            _ => 0.0,
                        })
                        .collect();
                    let name = format!("{}_{}", fitted.column, category);
                    columns.push(Series::new(name.into(), indicator).into_column());
                }
            }
            None => columns.push(col.clone()),
        }
    }
    Ok(DataFrame::new(columns)?)
}

/// The housing preprocessing pipeline in declaration order.
pub struct Pipeline {
    steps: Vec<Transformer>,
}

impl Pipeline {
    pub fn new(steps: Vec<Transformer>) -> Self {
        Self { steps }
    }

    /// Numeric conversion, then imputation, then one-hot encoding — the
    /// order the training script applies them in.
    pub fn standard() -> Self {
        Self::new(vec![
            Transformer::NumericConvert,
            Transformer::Impute,
            Transformer::OneHotEncode,
        ])
    }

    /// Fits each step against the output of the previous one and returns
    /// the transformed frame plus the fitted pipeline for persistence.
    pub fn fit_apply(&self, df: &DataFrame) -> Result<(DataFrame, FittedPipeline)> {
        let mut current = df.clone();
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let fitted = step.fit(&current)?;
            current = fitted.apply(&current)?;
            steps.push(fitted);
        }
        Ok((current, FittedPipeline { steps }))
    }
}

/// A fitted pipeline replays the training-time preprocessing against new
/// frames. Serialized alongside the model so the predict path encodes
/// inputs exactly as training did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    steps: Vec<FittedTransform>,
}

impl FittedPipeline {
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut current = df.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
        }
        Ok(current)
    }
}
