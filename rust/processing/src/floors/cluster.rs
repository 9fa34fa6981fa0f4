// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! One-dimensional k-means over centroid elevations.
//!
//! Centers are seeded at evenly spaced quantiles of the sorted input, which
//! makes the result deterministic and, for 1-D data, avoids the poor local
//! optima random seeding can land in. Lloyd iterations run until the
//! assignment is stable.

use std::cmp::Ordering;

const MAX_ITERATIONS: usize = 300;

/// Elements per floor assumed when estimating the cluster count.
const ELEMENTS_PER_FLOOR: usize = 100;
const MIN_CLUSTERS: usize = 2;
const MAX_CLUSTERS: usize = 5;

/// Errors from the clustering step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClusterError {
    #[error("{samples} samples cannot form {clusters} clusters")]
    TooFewSamples { samples: usize, clusters: usize },

    #[error("cluster count must be positive")]
    ZeroClusters,

    #[error("elevation {0} is not finite")]
    NonFinite(f64),
}

/// Result of a k-means run.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// Center elevation of every cluster, indexed by cluster id.
    pub centers: Vec<f64>,
    /// Cluster id per input value.
    pub labels: Vec<usize>,
    pub iterations: usize,
}

impl Clustering {
    /// Cluster ids ordered by ascending center elevation.
    pub fn rank_by_center(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.centers.len()).collect();
        order.sort_by(|&a, &b| {
            self.centers[a]
                .partial_cmp(&self.centers[b])
                .unwrap_or(Ordering::Equal)
        });
        order
    }
}

/// Estimated floor count: one floor per hundred elements, clamped to 2..=5.
pub fn cluster_count(elements: usize) -> usize {
    (elements / ELEMENTS_PER_FLOOR).clamp(MIN_CLUSTERS, MAX_CLUSTERS)
}

/// Partition `values` into `k` clusters.
pub fn kmeans_1d(values: &[f64], k: usize) -> Result<Clustering, ClusterError> {
    if k == 0 {
        return Err(ClusterError::ZeroClusters);
    }
    if values.len() < k {
        return Err(ClusterError::TooFewSamples {
            samples: values.len(),
            clusters: k,
        });
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(ClusterError::NonFinite(*bad));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    let mut centers: Vec<f64> = (0..k).map(|i| sorted[((2 * i + 1) * n) / (2 * k)]).collect();

    let mut labels = vec![usize::MAX; n];
    let mut iterations = 0;
    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let mut changed = false;
        for (label, &value) in labels.iter_mut().zip(values) {
            let nearest = nearest_center(&centers, value);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![0.0; k];
        let mut counts = vec![0usize; k];
        for (&label, &value) in labels.iter().zip(values) {
            sums[label] += value;
            counts[label] += 1;
        }
        for (cluster, center) in centers.iter_mut().enumerate() {
            // Empty clusters keep their previous center.
            if counts[cluster] > 0 {
                *center = sums[cluster] / counts[cluster] as f64;
            }
        }
    }

    Ok(Clustering {
        centers,
        labels,
        iterations,
    })
}

fn nearest_center(centers: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, center) in centers.iter().enumerate() {
        let distance = (value - center).abs();
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}
