//! Dimensionality reduction via incremental principal component analysis.
//!
//! The catalog may be too large to hold as one feature matrix, so the
//! reducer accumulates exact sufficient statistics (count, per-column sums
//! and the Gram matrix, in f64) batch by batch and eigendecomposes the
//! implied covariance after each batch. Batched and one-shot fits therefore
//! agree up to floating-point tolerance, in any batch order.

use crate::error::{EscucharError, Result};
use crate::primitives::Matrix;
use crate::traits::Transformer;
use log::warn;
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};

/// Default number of rows consumed per incremental batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Incremental PCA: linear orthogonal projection to `k < columns` dimensions.
///
/// The target dimensionality defaults to `columns - 1`; asking for
/// `k >= columns` is clamped to `columns - 1` with a logged warning rather
/// than treated as an error.
///
/// # Examples
///
/// ```
/// use escuchar::decomposition::IncrementalPca;
/// use escuchar::primitives::Matrix;
/// use escuchar::traits::Transformer;
///
/// let data = Matrix::from_vec(4, 3, vec![
///     1.0, 2.0, 3.0,
///     4.0, 5.0, 6.0,
///     7.0, 8.0, 10.0,
///     10.0, 11.0, 14.0,
/// ]).expect("valid matrix dimensions");
///
/// let mut pca = IncrementalPca::new(Some(2));
/// let reduced = pca.fit_transform(&data).expect("fit_transform should succeed");
/// assert_eq!(reduced.shape(), (4, 2));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalPca {
    /// Requested number of components; `None` means `columns - 1`.
    n_components: Option<usize>,
    /// Rows consumed per batch in one-shot `fit`.
    batch_size: usize,
    /// Total samples accumulated so far.
    n_samples_seen: u64,
    /// Per-column sums (f64 for accumulation stability).
    sum: Vec<f64>,
    /// Accumulated Gram matrix, row-major `n_features x n_features`.
    gram: Vec<f64>,
    /// Number of input columns, fixed by the first batch.
    n_features: Option<usize>,
    /// Resolved component count after clamping.
    n_components_resolved: Option<usize>,
    /// Per-column mean at the latest refresh.
    mean: Option<Vec<f32>>,
    /// Principal components, `k x n_features`.
    components: Option<Matrix<f32>>,
    /// Variance explained by each component.
    explained_variance: Option<Vec<f32>>,
    /// Ratio of variance explained by each component.
    explained_variance_ratio: Option<Vec<f32>>,
}

impl Default for IncrementalPca {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IncrementalPca {
    /// Creates a new incremental PCA.
    ///
    /// `n_components = None` defaults to `columns - 1` once the column count
    /// is known from the first batch.
    #[must_use]
    pub fn new(n_components: Option<usize>) -> Self {
        Self {
            n_components,
            batch_size: DEFAULT_BATCH_SIZE,
            n_samples_seen: 0,
            sum: Vec::new(),
            gram: Vec::new(),
            n_features: None,
            n_components_resolved: None,
            mean: None,
            components: None,
            explained_variance: None,
            explained_variance_ratio: None,
        }
    }

    /// Sets the batch size used by one-shot `fit`.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Resolved number of output dimensions, once fitted.
    #[must_use]
    pub fn n_components(&self) -> Option<usize> {
        self.n_components_resolved
    }

    /// Returns the variance explained by each component.
    #[must_use]
    pub fn explained_variance(&self) -> Option<&[f32]> {
        self.explained_variance.as_deref()
    }

    /// Returns the ratio of variance explained by each component.
    #[must_use]
    pub fn explained_variance_ratio(&self) -> Option<&[f32]> {
        self.explained_variance_ratio.as_deref()
    }

    /// Returns the principal components (`k x n_features`).
    #[must_use]
    pub fn components(&self) -> Option<&Matrix<f32>> {
        self.components.as_ref()
    }

    /// Returns true once a basis is available for transforms.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.components.is_some()
    }

    /// Accumulates one batch and refreshes the basis.
    ///
    /// Batches must share a column count; order of batches does not change
    /// the final basis beyond floating-point tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error on a column-count mismatch, fewer than two total
    /// columns, or an explicit `n_components` of zero.
    pub fn partial_fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        match self.n_features {
            None => {
                if n_features < 2 {
                    return Err(EscucharError::InvalidHyperparameter {
                        param: "n_features".to_string(),
                        value: n_features.to_string(),
                        constraint: ">= 2 (need at least one reducible dimension)".to_string(),
                    });
                }
                if self.n_components == Some(0) {
                    return Err(EscucharError::InvalidHyperparameter {
                        param: "n_components".to_string(),
                        value: "0".to_string(),
                        constraint: ">= 1".to_string(),
                    });
                }
                self.n_features = Some(n_features);
                self.sum = vec![0.0; n_features];
                self.gram = vec![0.0; n_features * n_features];

                let mut k = self.n_components.unwrap_or(n_features - 1);
                if k >= n_features {
                    warn!(
                        "n_components={k} >= n_features={n_features}; reducing to {}",
                        n_features - 1
                    );
                    k = n_features - 1;
                }
                self.n_components_resolved = Some(k);
            }
            Some(d) if d != n_features => {
                return Err(EscucharError::dimension_mismatch("columns", d, n_features));
            }
            Some(_) => {}
        }

        for i in 0..n_samples {
            let row = x.row_slice(i);
            for (j, &vj) in row.iter().enumerate() {
                let vj = f64::from(vj);
                self.sum[j] += vj;
                for (l, &vl) in row.iter().enumerate() {
                    self.gram[j * n_features + l] += vj * f64::from(vl);
                }
            }
        }
        self.n_samples_seen += n_samples as u64;

        if self.n_samples_seen >= 2 {
            self.refresh_basis()?;
        }
        Ok(())
    }

    /// Recomputes mean and eigenbasis from the accumulated statistics.
    fn refresh_basis(&mut self) -> Result<()> {
        let (Some(d), Some(k)) = (self.n_features, self.n_components_resolved) else {
            return Ok(());
        };
        #[allow(clippy::cast_precision_loss)]
        let n = self.n_samples_seen as f64;

        let mean_f64: Vec<f64> = self.sum.iter().map(|&s| s / n).collect();

        // Covariance from the Gram matrix: (G - n * mean meanT) / (n - 1).
        let cov = DMatrix::<f64>::from_fn(d, d, |i, j| {
            (self.gram[i * d + j] - n * mean_f64[i] * mean_f64[j]) / (n - 1.0)
        });
        let eigen = SymmetricEigen::new(cov);
        let eigenvalues = &eigen.eigenvalues;
        let eigenvectors = &eigen.eigenvectors;

        // Sort by eigenvalue (descending).
        let mut indices: Vec<usize> = (0..d).collect();
        indices.sort_by(|&a, &b| {
            eigenvalues[b]
                .partial_cmp(&eigenvalues[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut components_data = vec![0.0f32; k * d];
        let mut explained_variance = vec![0.0f32; k];
        for (i, &idx) in indices.iter().take(k).enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            {
                explained_variance[i] = eigenvalues[idx].max(0.0) as f32;
            }
            for j in 0..d {
                #[allow(clippy::cast_possible_truncation)]
                {
                    components_data[i * d + j] = eigenvectors[(j, idx)] as f32;
                }
            }
        }

        let total_variance: f64 = eigenvalues.iter().map(|&v| v.max(0.0)).sum();
        let explained_variance_ratio: Vec<f32> = explained_variance
            .iter()
            .map(|&v| {
                if total_variance > 0.0 {
                    #[allow(clippy::cast_possible_truncation)]
                    {
                        (f64::from(v) / total_variance) as f32
                    }
                } else {
                    0.0
                }
            })
            .collect();

        #[allow(clippy::cast_possible_truncation)]
        let mean: Vec<f32> = mean_f64.iter().map(|&m| m as f32).collect();

        self.mean = Some(mean);
        self.components = Some(Matrix::from_vec(k, d, components_data)?);
        self.explained_variance = Some(explained_variance);
        self.explained_variance_ratio = Some(explained_variance_ratio);
        Ok(())
    }

    /// Clears all accumulated state.
    fn reset(&mut self) {
        self.n_samples_seen = 0;
        self.sum.clear();
        self.gram.clear();
        self.n_features = None;
        self.n_components_resolved = None;
        self.mean = None;
        self.components = None;
        self.explained_variance = None;
        self.explained_variance_ratio = None;
    }
}

impl Transformer for IncrementalPca {
    /// One-shot fit: consumes `x` in `batch_size` batches.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        self.reset();

        let (n_samples, _) = x.shape();
        if n_samples < 2 {
            return Err("Cannot fit PCA with fewer than two samples".into());
        }

        let mut start = 0;
        while start < n_samples {
            let end = (start + self.batch_size).min(n_samples);
            self.partial_fit(&x.slice_rows(start, end))?;
            start = end;
        }
        Ok(())
    }

    /// Projects rows onto the fitted basis: `(x - mean) @ components^T`.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let components = self
            .components
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("IncrementalPca"))?;
        let mean = self
            .mean
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("IncrementalPca"))?;

        let (n_samples, n_features) = x.shape();
        if n_features != mean.len() {
            return Err(EscucharError::dimension_mismatch(
                "columns",
                mean.len(),
                n_features,
            ));
        }

        let k = components.n_rows();
        let mut result = vec![0.0; n_samples * k];
        for i in 0..n_samples {
            for c in 0..k {
                let mut value = 0.0;
                for j in 0..n_features {
                    value += (x.get(i, j) - mean[j]) * components.get(c, j);
                }
                result[i * k + c] = value;
            }
        }

        Matrix::from_vec(n_samples, k, result).map_err(Into::into)
    }
}
