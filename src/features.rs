//! Projection of consumer records onto the clustering feature space

use std::collections::HashSet;

use log::debug;
use ndarray::Array2;

use crate::data::Dataset;

/// Number of clustering features: age, annual income, spending score
pub const N_FEATURES: usize = 3;

/// Feature names in column order
pub const FEATURE_NAMES: [&str; N_FEATURES] = ["age", "annual_income", "spending_score"];

/// Clustering input: one row per record with a complete feature vector
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Raw (unscaled) features, shape (n_valid, 3)
    pub features: Array2<f64>,
    /// Record id of each row, in original relative order
    pub record_ids: Vec<usize>,
    /// Records left out because a required feature was null
    pub excluded: usize,
}

impl FeatureMatrix {
    /// Select `(age, annual_income, spending_score)` for every record with a known income
    ///
    /// Records with a null income are skipped rather than zero-filled; the
    /// remaining rows keep the dataset order.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let mut rows: Vec<[f64; N_FEATURES]> = Vec::with_capacity(dataset.len());
        let mut record_ids = Vec::with_capacity(dataset.len());

        for record in dataset.records() {
            if let Some(income) = record.annual_income {
                rows.push([record.age as f64, income, record.spending_score]);
                record_ids.push(record.id);
            }
        }

        let excluded = dataset.len() - record_ids.len();
        if excluded > 0 {
            debug!("Excluded {} record(s) with null income from the feature matrix", excluded);
        }

        let features = Array2::from_shape_fn((rows.len(), N_FEATURES), |(i, j)| rows[i][j]);

        Self {
            features,
            record_ids,
            excluded,
        }
    }

    pub fn nrows(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    /// Number of distinct feature vectors; bounds the feasible cluster count
    pub fn distinct_rows(&self) -> usize {
        self.features
            .outer_iter()
            .map(|row| row.iter().map(|value| value.to_bits()).collect::<Vec<u64>>())
            .collect::<HashSet<_>>()
            .len()
    }
}
