//! Error types for the segmentation pipeline

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading data, fitting segments or rendering charts.
///
/// Per-query "no data" situations are not errors; they surface as
/// [`crate::query::Stat::NotAvailable`].
#[derive(Error, Debug)]
pub enum Error {
    /// A structurally required column is absent from the input table
    #[error("Missing required column: {column}")]
    MissingColumn {
        /// Trimmed name of the missing column
        column: String,
    },

    /// Fewer distinct feature rows than requested clusters
    #[error("Insufficient data for k = {k}: only {available} distinct feature rows")]
    InsufficientData {
        /// Requested cluster count
        k: usize,
        /// Distinct feature rows available
        available: usize,
    },

    /// The feature matrix is empty
    #[error("No data to cluster")]
    NoDataToCluster,

    /// Invalid input parameters
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Error message
        message: String,
    },

    /// No restart produced a usable model
    #[error("Convergence failure: {message}")]
    ConvergenceFailure {
        /// Error message
        message: String,
    },

    /// Chart rendering failed
    #[error("Plot error: {message}")]
    Plot {
        /// Error message
        message: String,
    },

    #[error(transparent)]
    Polars(#[from] polars::prelude::PolarsError),

    #[error(transparent)]
    KMeans(#[from] linfa_clustering::KMeansError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a new MissingColumn error
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }

    /// Create a new InvalidParameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new ConvergenceFailure error
    pub fn convergence_failure(message: impl Into<String>) -> Self {
        Self::ConvergenceFailure {
            message: message.into(),
        }
    }

    /// Create a new Plot error
    pub fn plot(message: impl Into<String>) -> Self {
        Self::Plot {
            message: message.into(),
        }
    }

    /// Whether the error only rules out a cluster count for lack of data
    ///
    /// A sweep records it and continues; initialization keeps going without
    /// a segmentation.
    pub fn is_per_k(&self) -> bool {
        matches!(self, Self::InsufficientData { .. } | Self::NoDataToCluster)
    }
}
