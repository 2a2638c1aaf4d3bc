//! Preprocessing transformers for feature standardization.
//!
//! # Example
//!
//! ```
//! use escuchar::preprocessing::StandardScaler;
//! use escuchar::primitives::Matrix;
//! use escuchar::traits::Transformer;
//!
//! let data = Matrix::from_vec(4, 2, vec![
//!     1.0, 100.0,
//!     2.0, 200.0,
//!     3.0, 300.0,
//!     4.0, 400.0,
//! ]).expect("valid matrix dimensions");
//!
//! let mut scaler = StandardScaler::new();
//! let scaled = scaler.fit_transform(&data).expect("fit_transform should succeed");
//! assert!(scaled.get(0, 0).abs() < 2.0);
//! ```

use crate::error::{EscucharError, Result};
use crate::primitives::Matrix;
use crate::traits::Transformer;
use log::warn;
use serde::{Deserialize, Serialize};

/// Standardizes features by removing mean and scaling to unit variance.
///
/// The standard score of a sample x is: z = (x - mean) / scale.
///
/// Statistics are population statistics (divide by n) and are frozen at fit
/// time; query vectors are standardized with the catalog's statistics, never
/// refit. A zero-variance column would turn every value into NaN, so its
/// scale is substituted with 1.0 and the substitution is logged.
///
/// Fitting supports both a one-shot [`Transformer::fit`] and chunked
/// [`StandardScaler::partial_fit`] accumulation for catalogs that never
/// reside in memory at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Mean of each feature (computed during fit).
    mean: Option<Vec<f32>>,
    /// Per-feature divisor: population std, or 1.0 for degenerate columns.
    scale: Option<Vec<f32>>,
    /// Running sample count for partial_fit.
    n_seen: u64,
    /// Running per-column sums for partial_fit.
    sum: Vec<f64>,
    /// Running per-column sums of squares for partial_fit.
    sum_sq: Vec<f64>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

/// Columns whose population std falls below this are treated as degenerate.
const DEGENERATE_STD: f32 = 1e-10;

impl StandardScaler {
    /// Creates a new unfitted `StandardScaler`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mean: None,
            scale: None,
            n_seen: 0,
            sum: Vec::new(),
            sum_sq: Vec::new(),
        }
    }

    /// Returns the mean of each feature.
    ///
    /// # Panics
    ///
    /// Panics if the scaler is not fitted.
    #[must_use]
    pub fn mean(&self) -> &[f32] {
        self.mean
            .as_ref()
            .expect("Scaler not fitted. Call fit() first.")
    }

    /// Returns the per-feature divisor (std, or 1.0 for degenerate columns).
    ///
    /// # Panics
    ///
    /// Panics if the scaler is not fitted.
    #[must_use]
    pub fn scale(&self) -> &[f32] {
        self.scale
            .as_ref()
            .expect("Scaler not fitted. Call fit() first.")
    }

    /// Returns true if the scaler has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Accumulates statistics from one batch of rows.
    ///
    /// The fitted mean/scale are recomputed from the running sums after every
    /// batch, so the scaler is usable as soon as one batch has been seen and
    /// converges to the full-catalog statistics once every chunk is in.
    ///
    /// # Errors
    ///
    /// Returns an error on an empty first batch or a column-count mismatch
    /// with previously seen batches.
    pub fn partial_fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_samples, n_features) = x.shape();

        if n_samples == 0 && self.n_seen == 0 {
            return Err("Cannot fit with zero samples".into());
        }
        if self.n_seen == 0 {
            self.sum = vec![0.0; n_features];
            self.sum_sq = vec![0.0; n_features];
        } else if n_features != self.sum.len() {
            return Err(EscucharError::dimension_mismatch(
                "columns",
                self.sum.len(),
                n_features,
            ));
        }

        for i in 0..n_samples {
            for j in 0..n_features {
                let v = f64::from(x.get(i, j));
                self.sum[j] += v;
                self.sum_sq[j] += v * v;
            }
        }
        self.n_seen += n_samples as u64;

        self.refresh_statistics();
        Ok(())
    }

    /// Recomputes mean/scale from the running sums.
    fn refresh_statistics(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let n = self.n_seen as f64;
        let mut mean = Vec::with_capacity(self.sum.len());
        let mut scale = Vec::with_capacity(self.sum.len());

        for (j, (&s, &sq)) in self.sum.iter().zip(self.sum_sq.iter()).enumerate() {
            let m = s / n;
            // Population variance; clamp tiny negatives from rounding.
            let var = (sq / n - m * m).max(0.0);
            #[allow(clippy::cast_possible_truncation)]
            let std = (var.sqrt()) as f32;
            #[allow(clippy::cast_possible_truncation)]
            mean.push(m as f32);
            if std <= DEGENERATE_STD {
                warn!("degenerate column {j}: zero variance, substituting scale 1.0");
                scale.push(1.0);
            } else {
                scale.push(std);
            }
        }

        self.mean = Some(mean);
        self.scale = Some(scale);
    }

    /// Transforms data back to the original feature scale.
    ///
    /// # Errors
    ///
    /// Returns an error if the scaler is not fitted or dimensions mismatch.
    pub fn inverse_transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let mean = self
            .mean
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("StandardScaler"))?;
        let scale = self
            .scale
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("StandardScaler"))?;

        let (n_samples, n_features) = x.shape();
        if n_features != mean.len() {
            return Err(EscucharError::dimension_mismatch(
                "columns",
                mean.len(),
                n_features,
            ));
        }

        let mut result = vec![0.0; n_samples * n_features];
        for i in 0..n_samples {
            for j in 0..n_features {
                result[i * n_features + j] = x.get(i, j) * scale[j] + mean[j];
            }
        }

        Matrix::from_vec(n_samples, n_features, result).map_err(Into::into)
    }
}

impl Transformer for StandardScaler {
    /// Computes the mean and scale of each feature in one shot.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        self.n_seen = 0;
        self.sum.clear();
        self.sum_sq.clear();
        self.mean = None;
        self.scale = None;
        self.partial_fit(x)
    }

    /// Standardizes the data using the fitted statistics.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let mean = self
            .mean
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("StandardScaler"))?;
        let scale = self
            .scale
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("StandardScaler"))?;

        let (n_samples, n_features) = x.shape();
        if n_features != mean.len() {
            return Err(EscucharError::dimension_mismatch(
                "columns",
                mean.len(),
                n_features,
            ));
        }

        let mut result = vec![0.0; n_samples * n_features];
        for i in 0..n_samples {
            for j in 0..n_features {
                result[i * n_features + j] = (x.get(i, j) - mean[j]) / scale[j];
            }
        }

        Matrix::from_vec(n_samples, n_features, result).map_err(Into::into)
    }
}


#[cfg(test)]
#[path = "scaler_proptests.rs"]
mod scaler_proptests;
