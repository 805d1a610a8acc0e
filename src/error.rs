use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HousingBoostError {
    #[error("Data loading error: {0}")]
    DataLoading(#[from] PolarsError),
    #[error("Invalid argument error: {0}")]
    InvalidArgument(String),
    #[error("Data error: {0}")]
    Data(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, HousingBoostError>;
