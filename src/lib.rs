//! SegmentForge: consumer segmentation with K-Means clustering
//!
//! This library loads a consumer table, sweeps the K-Means inertia over a
//! range of cluster counts (elbow method), fits the final segments twice
//! (primary and reference) and answers filtered queries over a segment with
//! scoped and dataset-wide statistics.

pub mod cli;
pub mod config;
pub mod data;
pub mod elbow;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod segment;
pub mod viz;

// Re-export public items for easier access
pub use cli::Args;
pub use config::{AggregationConfig, Config, SegmentationConfig, DEFAULT_REFERENCE_SEED};
pub use data::{load_csv, load_dataframe, ConsumerRecord, Dataset, LoadReport};
pub use elbow::{ElbowCurve, ElbowPoint, ElbowSweep};
pub use error::{Error, Result};
pub use features::FeatureMatrix;
pub use model::{fit_kmeans, FitParams, SegmentModel};
pub use pipeline::Pipeline;
pub use query::{AggregateSummary, FilterCriteria, QueryEngine, QueryResult, Stat};
pub use segment::{align_labels, SegmentAssignment, Segmentation, Segmenter};
pub use viz::{render_elbow_curve, render_segment_scatter};
