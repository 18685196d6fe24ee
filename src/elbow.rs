//! Elbow method: inertia of the best K-Means fit for a range of cluster counts

use log::{info, warn};
use serde::Serialize;

use crate::config::SegmentationConfig;
use crate::error::{Error, Result};
use crate::features::FeatureMatrix;
use crate::model::{fit_kmeans, fit_warm_start, FitParams, SegmentModel};

/// Inertia of the best fit at one cluster count
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElbowPoint {
    pub k: usize,
    pub inertia: f64,
}

/// A cluster count the sweep could not evaluate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedK {
    pub k: usize,
    pub reason: String,
}

/// Inertia-vs-k curve for choosing the number of segments
///
/// The curve never picks a `k`; reading the bend is left to the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElbowCurve {
    points: Vec<ElbowPoint>,
    skipped: Vec<SkippedK>,
}

impl ElbowCurve {
    /// Evaluated points in increasing `k`
    pub fn points(&self) -> &[ElbowPoint] {
        &self.points
    }

    /// Cluster counts that were infeasible for the data
    pub fn skipped(&self) -> &[SkippedK] {
        &self.skipped
    }

    pub fn inertia_at(&self, k: usize) -> Option<f64> {
        self.points.iter().find(|point| point.k == k).map(|point| point.inertia)
    }

    pub fn is_non_increasing(&self) -> bool {
        self.points.windows(2).all(|pair| pair[1].inertia <= pair[0].inertia)
    }
}

/// Runs the clustering kernel over `[k_min, k_max]`
#[derive(Debug, Clone)]
pub struct ElbowSweep {
    k_min: usize,
    k_max: usize,
    params: FitParams,
    seed: u64,
}

impl ElbowSweep {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            k_min: config.k_min,
            k_max: config.k_max,
            params: FitParams::from(config),
            seed: config.seed,
        }
    }

    /// Fit every `k` in the range and record its inertia
    ///
    /// Each `k` keeps the best of the seeded restarts. From the second `k` on,
    /// a warm start seeded from the previous `k`'s best centroids competes as
    /// well; it can only lower the inertia, so the curve is non-increasing.
    /// A `k` larger than the number of distinct feature rows is recorded in
    /// [`ElbowCurve::skipped`] and the sweep moves on. An empty matrix skips
    /// every `k`.
    pub fn sweep(&self, matrix: &FeatureMatrix) -> Result<ElbowCurve> {
        if self.k_min == 0 || self.k_min > self.k_max {
            return Err(Error::invalid_parameter(format!(
                "invalid sweep range [{}, {}]",
                self.k_min, self.k_max
            )));
        }

        info!(
            "Elbow sweep over k = {}..={} on {} rows",
            self.k_min,
            self.k_max,
            matrix.nrows()
        );

        let mut curve = ElbowCurve::default();
        let mut previous: Option<SegmentModel> = None;

        for k in self.k_min..=self.k_max {
            match self.fit_k(matrix, k, previous.as_ref()) {
                Ok(model) => {
                    curve.points.push(ElbowPoint {
                        k,
                        inertia: model.inertia,
                    });
                    previous = Some(model);
                }
                Err(err) if err.is_per_k() => {
                    warn!("Skipping k = {}: {}", k, err);
                    curve.skipped.push(SkippedK {
                        k,
                        reason: err.to_string(),
                    });
                    previous = None;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(curve)
    }

    fn fit_k(&self, matrix: &FeatureMatrix, k: usize, previous: Option<&SegmentModel>) -> Result<SegmentModel> {
        let best = fit_kmeans(matrix, k, &self.params, self.seed)?;
        let Some(previous) = previous.filter(|previous| previous.n_clusters + 1 == k) else {
            return Ok(best);
        };

        let warm = fit_warm_start(matrix, previous, &self.params, self.seed)?;
        Ok(if warm.inertia < best.inertia { warm } else { best })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_matrix() -> FeatureMatrix {
        let features = array![
            [19.0, 15.0, 39.0],
            [21.0, 15.0, 81.0],
            [20.0, 16.0, 6.0],
            [23.0, 16.0, 77.0],
            [31.0, 17.0, 40.0],
            [22.0, 17.0, 76.0],
            [35.0, 18.0, 6.0],
            [23.0, 18.0, 94.0],
            [64.0, 19.0, 3.0],
            [30.0, 19.0, 72.0],
            [67.0, 19.0, 14.0],
            [35.0, 19.0, 99.0],
        ];
        FeatureMatrix {
            record_ids: (0..features.nrows()).collect(),
            features,
            excluded: 0,
        }
    }

    fn config() -> SegmentationConfig {
        SegmentationConfig::default().k_range(1, 8).n_init(3).max_iter(100)
    }

    #[test]
    fn test_sweep_is_non_increasing() {
        let curve = ElbowSweep::new(&config()).sweep(&create_test_matrix()).unwrap();

        assert_eq!(curve.points().len(), 8);
        assert!(curve.skipped().is_empty());
        assert!(curve.is_non_increasing());
        assert!(curve.points().iter().all(|point| point.inertia.is_finite() && point.inertia >= 0.0));
        assert_eq!(curve.points()[0].k, 1);
    }

    #[test]
    fn test_sweep_is_reproducible() {
        let sweep = ElbowSweep::new(&config());
        let matrix = create_test_matrix();
        assert_eq!(sweep.sweep(&matrix).unwrap(), sweep.sweep(&matrix).unwrap());
    }

    #[test]
    fn test_infeasible_k_is_skipped() {
        let matrix = create_test_matrix();
        let curve = ElbowSweep::new(&config().k_range(10, 14)).sweep(&matrix).unwrap();

        assert_eq!(curve.points().iter().map(|point| point.k).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert_eq!(curve.skipped().iter().map(|skip| skip.k).collect::<Vec<_>>(), vec![13, 14]);
        assert_eq!(curve.inertia_at(12), Some(0.0));
        assert_eq!(curve.inertia_at(13), None);
    }

    #[test]
    fn test_invalid_range_and_empty_matrix() {
        let matrix = create_test_matrix();
        assert!(ElbowSweep::new(&config().k_range(0, 3)).sweep(&matrix).is_err());
        assert!(ElbowSweep::new(&config().k_range(4, 3)).sweep(&matrix).is_err());

        let empty = FeatureMatrix {
            features: ndarray::Array2::zeros((0, 3)),
            record_ids: Vec::new(),
            excluded: 0,
        };
        let curve = ElbowSweep::new(&config().k_range(1, 3)).sweep(&empty).unwrap();
        assert!(curve.points().is_empty());
        assert_eq!(curve.skipped().iter().map(|skip| skip.k).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(curve.skipped()[0].reason, Error::NoDataToCluster.to_string());
    }
}
