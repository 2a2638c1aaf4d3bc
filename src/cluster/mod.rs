//! Mini-batch k-means clustering over reduced feature vectors.
//!
//! Cluster labels are advisory in this crate: they segment the catalog for
//! inspection and never gate retrieval. The mini-batch variant trades a
//! little assignment quality for the ability to fit without holding per-point
//! state for the whole catalog.

use crate::error::{EscucharError, Result};
use crate::metrics::inertia;
use crate::primitives::Matrix;
use crate::traits::UnsupervisedEstimator;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default number of clusters.
pub const DEFAULT_N_CLUSTERS: usize = 10;

/// Mini-batch k-means.
///
/// Each iteration samples `batch_size` rows, assigns them to the nearest
/// centroid, and moves each touched centroid toward the batch members with a
/// per-centroid learning rate of `1 / count`, so early updates move far and
/// later ones refine.
///
/// # Examples
///
/// ```
/// use escuchar::cluster::MiniBatchKMeans;
/// use escuchar::primitives::Matrix;
/// use escuchar::traits::UnsupervisedEstimator;
///
/// let data = Matrix::from_vec(6, 2, vec![
///     0.0, 0.0,  0.1, 0.1,  0.2, 0.0,
///     9.0, 9.0,  9.1, 9.2,  8.9, 9.1,
/// ]).expect("valid matrix dimensions");
///
/// let mut kmeans = MiniBatchKMeans::new(2).with_random_state(42);
/// kmeans.fit(&data).expect("fit should succeed");
/// let labels = kmeans.predict(&data).expect("predict should succeed");
/// assert_eq!(labels[0], labels[1]);
/// assert_ne!(labels[0], labels[3]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiniBatchKMeans {
    n_clusters: usize,
    batch_size: usize,
    max_iter: usize,
    tol: f32,
    random_state: Option<u64>,
    centroids: Option<Matrix<f32>>,
    inertia: Option<f32>,
}

impl Default for MiniBatchKMeans {
    fn default() -> Self {
        Self::new(DEFAULT_N_CLUSTERS)
    }
}

impl MiniBatchKMeans {
    /// Creates a new estimator with the given number of clusters.
    #[must_use]
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            batch_size: 1000,
            max_iter: 100,
            tol: 1e-4,
            random_state: None,
            centroids: None,
            inertia: None,
        }
    }

    /// Sets the mini-batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the maximum number of iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the centroid-shift convergence tolerance.
    #[must_use]
    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    /// Sets the random seed for reproducible fits.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Returns the fitted centroids (`n_clusters x n_features`).
    #[must_use]
    pub fn centroids(&self) -> Option<&Matrix<f32>> {
        self.centroids.as_ref()
    }

    /// Returns the training inertia (sum of squared distances to assigned
    /// centroids over the full training set).
    #[must_use]
    pub fn inertia(&self) -> Option<f32> {
        self.inertia
    }

    fn rng(&self) -> StdRng {
        match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn nearest_centroid(centroids: &Matrix<f32>, point: &[f32]) -> usize {
        let mut best = 0;
        let mut best_dist = f32::INFINITY;
        for c in 0..centroids.n_rows() {
            let dist: f32 = centroids
                .row_slice(c)
                .iter()
                .zip(point)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        best
    }
}

impl UnsupervisedEstimator for MiniBatchKMeans {
    type Labels = Vec<usize>;

    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();
        if self.n_clusters == 0 {
            return Err(EscucharError::InvalidHyperparameter {
                param: "n_clusters".to_string(),
                value: "0".to_string(),
                constraint: ">= 1".to_string(),
            });
        }
        if n_samples < self.n_clusters {
            return Err(EscucharError::InvalidHyperparameter {
                param: "n_clusters".to_string(),
                value: self.n_clusters.to_string(),
                constraint: format!("<= n_samples ({n_samples})"),
            });
        }

        let mut rng = self.rng();

        // Initialize centroids from distinct random rows.
        let init = rand::seq::index::sample(&mut rng, n_samples, self.n_clusters);
        let mut centroid_data = Vec::with_capacity(self.n_clusters * n_features);
        for idx in init.iter() {
            centroid_data.extend_from_slice(x.row_slice(idx));
        }
        let mut centroids = Matrix::from_vec(self.n_clusters, n_features, centroid_data)?;
        let mut counts = vec![0u64; self.n_clusters];

        let batch = self.batch_size.min(n_samples);
        for _ in 0..self.max_iter {
            let mut shift = 0.0f32;
            for _ in 0..batch {
                let i = rng.gen_range(0..n_samples);
                let point = x.row_slice(i).to_vec();
                let c = Self::nearest_centroid(&centroids, &point);
                counts[c] += 1;
                #[allow(clippy::cast_precision_loss)]
                let eta = 1.0 / counts[c] as f32;
                for j in 0..n_features {
                    let old = centroids.get(c, j);
                    let new = old + eta * (point[j] - old);
                    shift += (new - old) * (new - old);
                    centroids.set(c, j, new);
                }
            }
            if shift.sqrt() < self.tol {
                break;
            }
        }

        let labels: Vec<usize> = (0..n_samples)
            .map(|i| Self::nearest_centroid(&centroids, x.row_slice(i)))
            .collect();
        self.inertia = Some(inertia(x, &centroids, &labels));
        self.centroids = Some(centroids);
        Ok(())
    }

    /// Assigns each row to its nearest centroid.
    fn predict(&self, x: &Matrix<f32>) -> Result<Self::Labels> {
        let centroids = self
            .centroids
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("MiniBatchKMeans"))?;
        let (n_samples, n_features) = x.shape();
        if n_features != centroids.n_cols() {
            return Err(EscucharError::dimension_mismatch(
                "columns",
                centroids.n_cols(),
                n_features,
            ));
        }

        Ok((0..n_samples)
            .map(|i| Self::nearest_centroid(centroids, x.row_slice(i)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Matrix<f32> {
        let mut data = Vec::new();
        for i in 0..20 {
            let jitter = (i as f32) * 0.01;
            data.extend_from_slice(&[jitter, 0.1 + jitter]);
        }
        for i in 0..20 {
            let jitter = (i as f32) * 0.01;
            data.extend_from_slice(&[10.0 + jitter, 10.0 - jitter]);
        }
        Matrix::from_vec(40, 2, data).expect("sized to fit")
    }

    #[test]
    fn test_separates_two_blobs() {
        let x = two_blobs();
        let mut kmeans = MiniBatchKMeans::new(2).with_random_state(7);
        kmeans.fit(&x).expect("fit");
        let labels = kmeans.predict(&x).expect("predict");

        let first = labels[0];
        assert!(labels[..20].iter().all(|&l| l == first));
        let second = labels[20];
        assert!(labels[20..].iter().all(|&l| l == second));
        assert_ne!(first, second);
    }

    #[test]
    fn test_seeded_fit_is_deterministic() {
        let x = two_blobs();
        let mut a = MiniBatchKMeans::new(2).with_random_state(99);
        let mut b = MiniBatchKMeans::new(2).with_random_state(99);
        a.fit(&x).expect("fit");
        b.fit(&x).expect("fit");
        assert_eq!(a.predict(&x).expect("predict"), b.predict(&x).expect("predict"));
    }

    #[test]
    fn test_predict_before_fit_errors() {
        let kmeans = MiniBatchKMeans::new(2);
        assert!(matches!(
            kmeans.predict(&two_blobs()),
            Err(EscucharError::NotFitted { .. })
        ));
    }

    #[test]
    fn test_more_clusters_than_samples_rejected() {
        let x = Matrix::from_vec(2, 2, vec![0.0, 0.0, 1.0, 1.0]).expect("sized to fit");
        let mut kmeans = MiniBatchKMeans::new(5);
        assert!(matches!(
            kmeans.fit(&x),
            Err(EscucharError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn test_zero_clusters_rejected() {
        let mut kmeans = MiniBatchKMeans::new(0);
        assert!(matches!(
            kmeans.fit(&two_blobs()),
            Err(EscucharError::InvalidHyperparameter { .. })
        ));
    }

    #[test]
    fn test_predict_dimension_mismatch() {
        let x = two_blobs();
        let mut kmeans = MiniBatchKMeans::new(2).with_random_state(1);
        kmeans.fit(&x).expect("fit");

        let bad = Matrix::from_vec(1, 3, vec![0.0, 0.0, 0.0]).expect("sized to fit");
        assert!(matches!(
            kmeans.predict(&bad),
            Err(EscucharError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_inertia_available_after_fit() {
        let x = two_blobs();
        let mut kmeans = MiniBatchKMeans::new(2).with_random_state(3);
        kmeans.fit(&x).expect("fit");
        let inertia = kmeans.inertia().expect("fitted");
        assert!(inertia.is_finite());
        assert!(inertia >= 0.0);
    }
}
