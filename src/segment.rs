//! Final segmentation: primary and reference labelings at a fixed cluster count

use std::collections::HashSet;

use log::info;
use serde::Serialize;

use crate::config::SegmentationConfig;
use crate::data::Dataset;
use crate::error::Result;
use crate::features::FeatureMatrix;
use crate::model::{fit_kmeans, squared_distance, FitParams, SegmentModel};

/// Segment label per record id; `None` for records left out of clustering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentAssignment {
    n_clusters: usize,
    labels: Vec<Option<usize>>,
}

impl SegmentAssignment {
    /// Map a model's row labels back onto record ids
    pub fn from_model(model: &SegmentModel, matrix: &FeatureMatrix, n_records: usize) -> Self {
        let mut labels = vec![None; n_records];
        for (&record_id, &label) in matrix.record_ids.iter().zip(model.labels.iter()) {
            if let Some(slot) = labels.get_mut(record_id) {
                *slot = Some(label);
            }
        }

        Self {
            n_clusters: model.n_clusters,
            labels,
        }
    }

    /// Build an assignment from explicit labels indexed by record id
    pub fn from_labels(n_clusters: usize, labels: Vec<Option<usize>>) -> Self {
        Self { n_clusters, labels }
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn label_of(&self, record_id: usize) -> Option<usize> {
        self.labels.get(record_id).copied().flatten()
    }

    /// Labels indexed by record id
    pub fn labels(&self) -> &[Option<usize>] {
        &self.labels
    }

    pub fn assigned_count(&self) -> usize {
        self.labels.iter().filter(|label| label.is_some()).count()
    }

    /// Distinct labels in order of first appearance
    pub fn segment_ids(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.labels
            .iter()
            .flatten()
            .copied()
            .filter(|label| seen.insert(*label))
            .collect()
    }
}

/// Fits the final model at a fixed cluster count
#[derive(Debug, Clone)]
pub struct Segmenter {
    n_clusters: usize,
    params: FitParams,
}

impl Segmenter {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            n_clusters: config.n_clusters,
            params: FitParams::from(config),
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.n_clusters
    }

    /// Fit one labeling with the given base seed
    ///
    /// Returns `Error::NoDataToCluster` on an empty matrix and
    /// `Error::InsufficientData` when there are fewer distinct rows than clusters.
    pub fn fit(&self, matrix: &FeatureMatrix, seed: u64) -> Result<SegmentModel> {
        fit_kmeans(matrix, self.n_clusters, &self.params, seed)
    }
}

/// Primary and reference segmentations of one dataset
///
/// Both use the same cluster count and restart policy but are fitted
/// independently, so label `i` of one need not match label `i` of the other.
/// Use [`align_labels`] when a correspondence is needed.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub primary_model: SegmentModel,
    pub reference_model: SegmentModel,
    pub primary: SegmentAssignment,
    pub reference: SegmentAssignment,
}

impl Segmentation {
    pub fn build(dataset: &Dataset, matrix: &FeatureMatrix, config: &SegmentationConfig) -> Result<Self> {
        let segmenter = Segmenter::new(config);
        info!(
            "Fitting {} segments on {} rows (seeds {} / {})",
            segmenter.n_clusters(),
            matrix.nrows(),
            config.seed,
            config.reference_seed
        );

        let primary_model = segmenter.fit(matrix, config.seed)?;
        let reference_model = segmenter.fit(matrix, config.reference_seed)?;
        info!(
            "Segment inertia: primary {:.2}, reference {:.2}",
            primary_model.inertia, reference_model.inertia
        );

        let primary = SegmentAssignment::from_model(&primary_model, matrix, dataset.len());
        let reference = SegmentAssignment::from_model(&reference_model, matrix, dataset.len());

        Ok(Self {
            primary_model,
            reference_model,
            primary,
            reference,
        })
    }

    /// Segment choices offered to the operator
    pub fn segment_ids(&self) -> Vec<usize> {
        self.primary.segment_ids()
    }
}

/// Map each reference label to the primary label with the closest centroid
///
/// Pairs are matched greedily from the closest centroid pair outwards, one to
/// one. Entry `r` of the result is the primary label for reference label `r`,
/// or `None` when the reference has more clusters than the primary.
pub fn align_labels(primary: &SegmentModel, reference: &SegmentModel) -> Vec<Option<usize>> {
    let mut pairs = Vec::with_capacity(primary.n_clusters * reference.n_clusters);
    for (r, reference_centroid) in reference.centroids.outer_iter().enumerate() {
        for (p, primary_centroid) in primary.centroids.outer_iter().enumerate() {
            pairs.push((squared_distance(reference_centroid, primary_centroid), r, p));
        }
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut mapping = vec![None; reference.n_clusters];
    let mut taken = vec![false; primary.n_clusters];
    for (_, r, p) in pairs {
        if mapping[r].is_none() && !taken[p] {
            mapping[r] = Some(p);
            taken[p] = true;
        }
    }
    mapping
}
