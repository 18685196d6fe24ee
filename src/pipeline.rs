//! One-shot initialization: load, select features, sweep, segment

use std::path::Path;

use log::{info, warn};

use crate::config::Config;
use crate::data::{load_csv, Dataset};
use crate::elbow::{ElbowCurve, ElbowSweep};
use crate::error::Result;
use crate::features::FeatureMatrix;
use crate::query::QueryEngine;
use crate::segment::Segmentation;

/// Fitted state of one dataset, immutable once built
///
/// Queries borrow it through [`Pipeline::query_engine`]; nothing here changes
/// after [`Pipeline::initialize`] returns.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub config: Config,
    pub dataset: Dataset,
    pub features: FeatureMatrix,
    pub elbow: ElbowCurve,
    /// `None` when there was too little data for `n_clusters` segments
    pub segmentation: Option<Segmentation>,
    /// Why the segmentation is missing
    pub segmentation_error: Option<String>,
}

impl Pipeline {
    /// Run the sweep and both segmentation fits over an already loaded dataset
    ///
    /// Too little data to segment is not fatal: the pipeline comes up without
    /// a segmentation and queries still serve the dataset-wide statistics.
    pub fn initialize(dataset: Dataset, config: Config) -> Result<Self> {
        config.segmentation.validate()?;

        let features = FeatureMatrix::from_dataset(&dataset);
        info!(
            "Feature matrix: {} rows ({} excluded for null income)",
            features.nrows(),
            features.excluded
        );

        let elbow = ElbowSweep::new(&config.segmentation).sweep(&features)?;
        let (segmentation, segmentation_error) =
            match Segmentation::build(&dataset, &features, &config.segmentation) {
                Ok(segmentation) => (Some(segmentation), None),
                Err(err) if err.is_per_k() => {
                    warn!("Segmentation unavailable: {}", err);
                    (None, Some(err.to_string()))
                }
                Err(err) => return Err(err),
            };

        Ok(Self {
            config,
            dataset,
            features,
            elbow,
            segmentation,
            segmentation_error,
        })
    }

    /// Load a CSV file and initialize
    pub fn from_csv(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let dataset = load_csv(path)?;
        Self::initialize(dataset, config)
    }

    /// Query interface; without a segmentation every record is unassigned
    pub fn query_engine(&self) -> QueryEngine<'_> {
        let engine = match &self.segmentation {
            Some(segmentation) => {
                QueryEngine::new(&self.dataset, &segmentation.primary).with_reference(&segmentation.reference)
            }
            None => QueryEngine::unsegmented(&self.dataset),
        };
        engine.with_config(self.config.aggregation.clone())
    }
}
