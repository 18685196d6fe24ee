//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::config::Config;
use crate::query::FilterCriteria;

/// Consumer segmentation CLI: elbow sweep, K-Means segments and filtered segment statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "consumers.csv")]
    pub input: PathBuf,

    /// JSON configuration file; command-line flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of segments for the final K-Means fit
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Largest cluster count evaluated by the elbow sweep
    #[arg(long)]
    pub k_max: Option<usize>,

    /// Maximum iterations per K-Means restart
    #[arg(long)]
    pub max_iters: Option<usize>,

    /// Number of seeded K-Means restarts
    #[arg(long)]
    pub n_init: Option<usize>,

    /// Tolerance for K-Means convergence
    #[arg(long)]
    pub tolerance: Option<f64>,

    /// Seed of the primary segmentation and the elbow sweep
    #[arg(long)]
    pub seed: Option<u64>,

    /// Seed of the reference segmentation
    #[arg(long)]
    pub reference_seed: Option<u64>,

    /// Segment to inspect (defaults to the first segment found)
    #[arg(short, long)]
    pub segment: Option<usize>,

    /// Age range to inspect, inclusive: "min,max"
    #[arg(short, long, default_value = "18,70")]
    pub ages: String,

    /// Accepted payment methods, comma separated (defaults to all)
    #[arg(short, long, value_delimiter = ',')]
    pub payment_methods: Vec<String>,

    /// Print the query result as JSON instead of a report
    #[arg(long)]
    pub json: bool,

    /// Directory for the elbow and scatter SVG charts
    #[arg(long)]
    pub plot_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Load the configuration file (or defaults) and apply flag overrides
    pub fn resolve_config(&self) -> crate::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)?,
            None => Config::default(),
        };

        let segmentation = &mut config.segmentation;
        if let Some(clusters) = self.clusters {
            segmentation.n_clusters = clusters;
        }
        if let Some(k_max) = self.k_max {
            segmentation.k_max = k_max;
        }
        if let Some(max_iters) = self.max_iters {
            segmentation.max_iter = max_iters;
        }
        if let Some(n_init) = self.n_init {
            segmentation.n_init = n_init;
        }
        if let Some(tolerance) = self.tolerance {
            segmentation.tolerance = tolerance;
        }
        if let Some(seed) = self.seed {
            segmentation.seed = seed;
        }
        if let Some(reference_seed) = self.reference_seed {
            segmentation.reference_seed = reference_seed;
        }

        segmentation.validate()?;
        Ok(config)
    }

    /// Parse the age range from the ages string
    /// Expected format: "min,max"
    pub fn parse_age_range(&self) -> crate::Result<(i64, i64)> {
        let parts: Vec<&str> = self.ages.split(',').collect();
        if parts.len() != 2 {
            return Err(crate::Error::invalid_parameter("Age range must be in format 'min,max'"));
        }

        let min: i64 = parts[0]
            .trim()
            .parse()
            .map_err(|_| crate::Error::invalid_parameter(format!("Invalid minimum age: {}", parts[0])))?;
        let max: i64 = parts[1]
            .trim()
            .parse()
            .map_err(|_| crate::Error::invalid_parameter(format!("Invalid maximum age: {}", parts[1])))?;

        Ok((min, max))
    }

    /// Build the query criteria, falling back to the dataset's choices
    pub fn criteria(&self, default_segment: usize, all_methods: Vec<String>) -> crate::Result<FilterCriteria> {
        let (age_min, age_max) = self.parse_age_range()?;
        let methods = if self.payment_methods.is_empty() {
            all_methods
        } else {
            self.payment_methods.iter().map(|method| method.trim().to_string()).collect()
        };

        Ok(FilterCriteria::new(self.segment.unwrap_or(default_segment))
            .age_range(age_min, age_max)
            .payment_methods(methods))
    }
}
