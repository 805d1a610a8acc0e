use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{HousingBoostError, Result};

/// Row-major numeric feature matrix with an optional parallel label vector.
///
/// Read-only after construction: shuffling and splitting produce new
/// matrices instead of mutating in place.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    features: Array2<f64>,
    labels: Option<Vec<f64>>,
}

impl FeatureMatrix {
    /// Builds a matrix from row-major data. Every row must have the same
    /// length, all values must be finite, and the label vector (when
    /// present) must be parallel to the rows.
    pub fn from_rows(rows: Vec<Vec<f64>>, labels: Option<Vec<f64>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(HousingBoostError::Data("dataset is empty".to_string()));
        }

        let n_features = rows[0].len();
        let mut values = Vec::with_capacity(rows.len() * n_features);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(HousingBoostError::InvalidArgument(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    n_features
                )));
            }
            values.extend_from_slice(row);
        }

        let features = Array2::from_shape_vec((rows.len(), n_features), values)
            .map_err(|e| HousingBoostError::InvalidArgument(e.to_string()))?;

        Self::from_parts(features, labels)
    }

    /// Builds a matrix from an already-shaped array plus optional labels.
    pub fn from_parts(features: Array2<f64>, labels: Option<Vec<f64>>) -> Result<Self> {
        if features.nrows() == 0 {
            return Err(HousingBoostError::Data("dataset is empty".to_string()));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(HousingBoostError::Data(
                "feature matrix contains a non-finite value".to_string(),
            ));
        }
        if let Some(labels) = &labels {
            if labels.len() != features.nrows() {
                return Err(HousingBoostError::InvalidArgument(format!(
                    "{} labels for {} rows",
                    labels.len(),
                    features.nrows()
                )));
            }
            if labels.iter().any(|v| !v.is_finite()) {
                return Err(HousingBoostError::Data(
                    "label vector contains a non-finite value".to_string(),
                ));
            }
        }

        Ok(Self { features, labels })
    }

    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> ArrayView2<f64> {
        self.features.view()
    }

    pub fn row(&self, i: usize) -> ArrayView1<f64> {
        self.features.row(i)
    }

    pub fn labels(&self) -> Option<&[f64]> {
        self.labels.as_deref()
    }

    /// Returns a row-permuted copy. The permutation is fully determined by
    /// the seed.
    pub fn shuffle(&self, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..self.n_rows()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let features = self.features.select(Axis(0), &indices);
        let labels = self
            .labels
            .as_ref()
            .map(|labels| indices.iter().map(|&i| labels[i]).collect());

        Self { features, labels }
    }

    /// Splits into (train, test) at a contiguous cut: `round(ratio * n)`
    /// rows go to the training part, the remainder to the test part.
    pub fn split(&self, ratio: f64) -> Result<(Self, Self)> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(HousingBoostError::InvalidArgument(format!(
                "split ratio must be in (0, 1), got {}",
                ratio
            )));
        }

        let n = self.n_rows();
        let n_train = (ratio * n as f64).round() as usize;

        let train_features = self.features.slice(s![..n_train, ..]).to_owned();
        let test_features = self.features.slice(s![n_train.., ..]).to_owned();
        let (train_labels, test_labels) = match &self.labels {
            Some(labels) => {
                let (a, b) = labels.split_at(n_train);
                (Some(a.to_vec()), Some(b.to_vec()))
            }
            None => (None, None),
        };

        Ok((
            Self {
                features: train_features,
                labels: train_labels,
            },
            Self {
                features: test_features,
                labels: test_labels,
            },
        ))
    }

    /// Extracts a single feature column.
    pub fn column(&self, i: usize) -> Result<Vec<f64>> {
        if i >= self.n_features() {
            return Err(HousingBoostError::InvalidArgument(format!(
                "column index {} out of range for {} features",
                i,
                self.n_features()
            )));
        }
        Ok(self.features.column(i).to_vec())
    }

    /// Returns a copy of the matrix with one feature column projected away.
    /// Used to separate an identifier column from the feature columns.
    pub fn without_column(&self, i: usize) -> Result<Self> {
        if i >= self.n_features() {
            return Err(HousingBoostError::InvalidArgument(format!(
                "column index {} out of range for {} features",
                i,
                self.n_features()
            )));
        }
        let keep: Vec<usize> = (0..self.n_features()).filter(|&c| c != i).collect();
        Ok(Self {
            features: self.features.select(Axis(1), &keep),
            labels: self.labels.clone(),
        })
    }
}
