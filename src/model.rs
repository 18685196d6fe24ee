//! K-Means clustering kernel shared by the elbow sweep and the segmentation fits

use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use log::debug;
use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::config::SegmentationConfig;
use crate::error::{Error, Result};
use crate::features::FeatureMatrix;

/// Restart and iteration policy of a single K-Means fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    /// Maximum Lloyd iterations per restart
    pub max_iter: usize,
    /// Number of seeded restarts
    pub n_init: usize,
    /// Convergence tolerance on centroid movement
    pub tolerance: f64,
}

impl From<&SegmentationConfig> for FitParams {
    fn from(config: &SegmentationConfig) -> Self {
        Self {
            max_iter: config.max_iter,
            n_init: config.n_init,
            tolerance: config.tolerance,
        }
    }
}

/// A fitted partition of the feature matrix
#[derive(Debug, Clone)]
pub struct SegmentModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Cluster label of every feature matrix row
    pub labels: Array1<usize>,
    /// Cluster centroids in raw feature space
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares (inertia)
    pub inertia: f64,
    /// Seed of the winning restart
    pub seed: u64,
    /// Index of the winning restart (`n_init` for a warm start)
    pub restart: usize,
}

impl SegmentModel {
    /// Assign every row to its nearest centroid and score the partition
    pub fn from_centroids(features: &Array2<f64>, centroids: Array2<f64>, seed: u64, restart: usize) -> Self {
        let labels = assign_labels(features, &centroids);
        let inertia = compute_inertia(features, &labels, &centroids);

        Self {
            n_clusters: centroids.nrows(),
            labels,
            centroids,
            inertia,
            seed,
            restart,
        }
    }

    /// Predict the cluster of a feature vector
    pub fn predict(&self, features: ArrayView1<f64>) -> usize {
        nearest_centroid(features, &self.centroids)
    }

    /// Get cluster sizes
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in self.labels.iter() {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

/// Fit K-Means with `n_init` seeded K-Means++ restarts and keep the best one
///
/// Restart `i` is seeded with `seed + i`. The restart with the lowest inertia
/// wins; on equal inertia the earlier restart is kept.
///
/// # Arguments
/// * `matrix` - Feature matrix to partition
/// * `n_clusters` - Number of clusters
/// * `params` - Restart and iteration policy
/// * `seed` - Base seed
///
/// # Returns
/// * Fitted `SegmentModel` with labels, centroids and inertia
pub fn fit_kmeans(matrix: &FeatureMatrix, n_clusters: usize, params: &FitParams, seed: u64) -> Result<SegmentModel> {
    check_feasible(matrix, n_clusters)?;
    if params.n_init == 0 {
        return Err(Error::invalid_parameter("n_init must be > 0"));
    }

    let features = &matrix.features;
    let targets: Array1<usize> = Array1::zeros(features.nrows());
    let dataset = Dataset::new(features.clone(), targets);

    let runs: Vec<Result<SegmentModel>> = (0..params.n_init)
        .into_par_iter()
        .map(|restart| {
            let restart_seed = seed.wrapping_add(restart as u64);
            let centroids = run_lloyd(
                &dataset,
                n_clusters,
                KMeansInit::KMeansPlusPlus,
                params,
                restart_seed,
            )?;
            Ok(SegmentModel::from_centroids(features, centroids, restart_seed, restart))
        })
        .collect();

    let mut best: Option<SegmentModel> = None;
    let mut last_error = None;
    for run in runs {
        match run {
            Ok(model) => {
                debug!(
                    "k = {}: restart {} (seed {}) inertia {:.4}",
                    n_clusters, model.restart, model.seed, model.inertia
                );
                if best.as_ref().map_or(true, |current| model.inertia < current.inertia) {
                    best = Some(model);
                }
            }
            Err(err) => {
                debug!("k = {}: restart failed: {}", n_clusters, err);
                last_error = Some(err);
            }
        }
    }

    best.ok_or_else(|| {
        Error::convergence_failure(format!(
            "no restart out of {} produced a model for k = {}{}",
            params.n_init,
            n_clusters,
            last_error.map(|err| format!(" (last error: {})", err)).unwrap_or_default()
        ))
    })
}

/// Refine a `k + 1` partition started from `previous`'s centroids plus the worst-served point
///
/// The starting centroids already score at most `previous.inertia` and Lloyd
/// iterations never increase inertia, so the result does not exceed it either.
/// When the refinement does not converge the starting centroids are used.
pub fn fit_warm_start(matrix: &FeatureMatrix, previous: &SegmentModel, params: &FitParams, seed: u64) -> Result<SegmentModel> {
    let n_clusters = previous.n_clusters + 1;
    check_feasible(matrix, n_clusters)?;

    let features = &matrix.features;
    let initial = warm_start_centroids(features, previous)?;

    let targets: Array1<usize> = Array1::zeros(features.nrows());
    let dataset = Dataset::new(features.clone(), targets);

    let start = SegmentModel::from_centroids(features, initial.clone(), seed, params.n_init);
    let refined = match run_lloyd(&dataset, n_clusters, KMeansInit::Precomputed(initial), params, seed) {
        Ok(centroids) => Some(SegmentModel::from_centroids(features, centroids, seed, params.n_init)),
        Err(err) => {
            debug!("k = {}: warm start did not converge ({}), keeping its seed centroids", n_clusters, err);
            None
        }
    };

    // Never hand back more than the starting inertia.
    Ok(match refined {
        Some(model) if model.inertia <= start.inertia => model,
        _ => start,
    })
}

/// One Lloyd run through linfa; returns the fitted centroids
fn run_lloyd(
    dataset: &DatasetBase<Array2<f64>, Array1<usize>>,
    n_clusters: usize,
    init: KMeansInit<f64>,
    params: &FitParams,
    seed: u64,
) -> Result<Array2<f64>> {
    let model = KMeans::params_with(n_clusters, StdRng::seed_from_u64(seed), L2Dist)
        .n_runs(1)
        .init_method(init)
        .max_n_iterations(params.max_iter as u64)
        .tolerance(params.tolerance)
        .fit(dataset)?;

    Ok(model.centroids().clone())
}

/// Previous centroids plus the row farthest from its assigned centroid
fn warm_start_centroids(features: &Array2<f64>, previous: &SegmentModel) -> Result<Array2<f64>> {
    let mut farthest = 0;
    let mut max_distance = f64::NEG_INFINITY;
    for (i, point) in features.outer_iter().enumerate() {
        let distance = squared_distance(point, previous.centroids.row(previous.labels[i]));
        if distance > max_distance {
            max_distance = distance;
            farthest = i;
        }
    }

    let mut centroids = previous.centroids.clone();
    centroids
        .push_row(features.row(farthest))
        .map_err(|err| Error::invalid_parameter(format!("centroid shape mismatch: {}", err)))?;
    Ok(centroids)
}

fn check_feasible(matrix: &FeatureMatrix, n_clusters: usize) -> Result<()> {
    if n_clusters == 0 {
        return Err(Error::invalid_parameter("Number of clusters must be > 0"));
    }
    if matrix.is_empty() {
        return Err(Error::NoDataToCluster);
    }

    let available = matrix.distinct_rows();
    if available < n_clusters {
        return Err(Error::InsufficientData {
            k: n_clusters,
            available,
        });
    }
    Ok(())
}

/// Label every row with its nearest centroid; ties go to the lower label
pub fn assign_labels(features: &Array2<f64>, centroids: &Array2<f64>) -> Array1<usize> {
    features
        .outer_iter()
        .map(|point| nearest_centroid(point, centroids))
        .collect()
}

fn nearest_centroid(point: ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest_cluster = 0;

    for (cluster_idx, centroid) in centroids.outer_iter().enumerate() {
        let distance = squared_distance(point, centroid);
        if distance < min_distance {
            min_distance = distance;
            closest_cluster = cluster_idx;
        }
    }

    closest_cluster
}

/// Compute within-cluster sum of squares (inertia)
pub fn compute_inertia(features: &Array2<f64>, labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    let mut inertia = 0.0;

    for (i, &cluster) in labels.iter().enumerate() {
        if cluster < centroids.nrows() {
            inertia += squared_distance(features.row(i), centroids.row(cluster));
        }
    }

    inertia
}

pub(crate) fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
