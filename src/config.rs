//! Pipeline configuration
//!
//! Defaults reproduce the dashboard this crate was built for: a 1..=20 elbow
//! sweep, five segments, K-Means++ with ten restarts of at most 300 iterations,
//! seed 0 for the primary fit, and "high income" meaning an annual income above 20 (thousands).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default base seed of the reference fit
///
/// Far enough from the primary seed that the two restart sequences
/// `seed..seed + n_init` do not overlap at the default `n_init`.
pub const DEFAULT_REFERENCE_SEED: u64 = 42;

/// Parameters shared by the elbow sweep and the segmentation fits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Smallest cluster count evaluated by the sweep
    pub k_min: usize,
    /// Largest cluster count evaluated by the sweep
    pub k_max: usize,
    /// Cluster count of the final segmentation
    pub n_clusters: usize,
    /// Maximum Lloyd iterations per restart
    pub max_iter: usize,
    /// Number of seeded restarts per fit
    pub n_init: usize,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
    /// Base seed of the primary fit and of the sweep
    pub seed: u64,
    /// Base seed of the reference fit, independent of `seed`
    pub reference_seed: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            k_min: 1,
            k_max: 20,
            n_clusters: 5,
            max_iter: 300,
            n_init: 10,
            tolerance: 1e-4,
            seed: 0,
            reference_seed: DEFAULT_REFERENCE_SEED,
        }
    }
}

impl SegmentationConfig {
    /// Set the sweep range
    pub fn k_range(mut self, k_min: usize, k_max: usize) -> Self {
        self.k_min = k_min;
        self.k_max = k_max;
        self
    }

    /// Set the cluster count of the final segmentation
    pub fn n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    /// Set the maximum number of iterations
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of restarts
    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init;
        self
    }

    /// Set the convergence tolerance
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the primary seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the reference seed
    pub fn reference_seed(mut self, seed: u64) -> Self {
        self.reference_seed = seed;
        self
    }

    /// Check the parameters for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.k_min == 0 {
            return Err(Error::invalid_parameter("k_min must be > 0"));
        }
        if self.k_min > self.k_max {
            return Err(Error::invalid_parameter(format!(
                "k_min ({}) must not exceed k_max ({})",
                self.k_min, self.k_max
            )));
        }
        if self.n_clusters == 0 {
            return Err(Error::invalid_parameter("n_clusters must be > 0"));
        }
        if self.max_iter == 0 {
            return Err(Error::invalid_parameter("max_iter must be > 0"));
        }
        if self.n_init == 0 {
            return Err(Error::invalid_parameter("n_init must be > 0"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::invalid_parameter("tolerance must be a positive number"));
        }
        Ok(())
    }
}

/// Thresholds and labels used by the aggregation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Income strictly above this value counts as "high income"
    pub high_income_threshold: f64,
    /// Spending score strictly above this value marks a potential consumer
    pub spending_threshold: f64,
    /// Payment method whose users' mean age is reported per query
    pub cash_method: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            high_income_threshold: 20.0,
            spending_threshold: 70.0,
            cash_method: "Cash".to_string(),
        }
    }
}

/// Full configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub segmentation: SegmentationConfig,
    pub aggregation: AggregationConfig,
}

impl Config {
    /// Read a JSON configuration file; absent keys keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.segmentation.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_dashboard() {
        let config = SegmentationConfig::default();
        assert_eq!((config.k_min, config.k_max), (1, 20));
        assert_eq!(config.n_clusters, 5);
        assert_eq!(config.n_init, 10);
        assert_eq!(config.max_iter, 300);
        assert_eq!(config.seed, 0);
        assert_eq!(config.reference_seed, DEFAULT_REFERENCE_SEED);
        assert_ne!(config.seed, config.reference_seed);
        assert!(config.validate().is_ok());

        let aggregation = AggregationConfig::default();
        assert_eq!(aggregation.cash_method, "Cash");
        assert_eq!(aggregation.high_income_threshold, 20.0);
    }

    #[test]
    fn test_builder_and_validation() {
        let config = SegmentationConfig::default()
            .k_range(2, 8)
            .n_clusters(3)
            .n_init(4)
            .seed(7)
            .reference_seed(11);
        assert_eq!(config.k_min, 2);
        assert_eq!(config.reference_seed, 11);
        assert!(config.validate().is_ok());

        assert!(SegmentationConfig::default().k_range(0, 3).validate().is_err());
        assert!(SegmentationConfig::default().k_range(5, 3).validate().is_err());
        assert!(SegmentationConfig::default().n_init(0).validate().is_err());
        assert!(SegmentationConfig::default().tolerance(0.0).validate().is_err());
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"segmentation": {{"n_clusters": 6, "seed": 3}}, "aggregation": {{"cash_method": "Efectivo"}}}}"#
        )
        .unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.segmentation.n_clusters, 6);
        assert_eq!(config.segmentation.seed, 3);
        assert_eq!(config.segmentation.k_max, 20);
        assert_eq!(config.aggregation.cash_method, "Efectivo");
        assert_eq!(config.aggregation.spending_threshold, 70.0);
    }
}
