//! Brute-force cosine k-nearest-neighbor retrieval.
//!
//! The index is just the fitted matrix: every query scans all rows and ranks
//! them by cosine distance. For catalogs in the tens of thousands of rows
//! this is fast enough and, unlike approximate indexes, exact.

use crate::error::{EscucharError, Result};
use crate::metrics::cosine_distance;
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};

/// Default neighbor count per query.
pub const DEFAULT_N_NEIGHBORS: usize = 10;

/// Exact cosine nearest-neighbor index.
///
/// # Examples
///
/// ```
/// use escuchar::neighbors::NearestNeighbors;
/// use escuchar::primitives::Matrix;
///
/// let index = Matrix::from_vec(3, 2, vec![
///     1.0, 0.0,
///     0.0, 1.0,
///     1.0, 1.0,
/// ]).expect("valid matrix dimensions");
///
/// let mut nn = NearestNeighbors::new(2);
/// nn.fit(&index).expect("fit should succeed");
///
/// let query = Matrix::from_vec(1, 2, vec![1.0, 0.1]).expect("valid matrix dimensions");
/// let (distances, indices) = nn.kneighbors(&query).expect("kneighbors should succeed");
/// assert_eq!(indices[0][0], 0);
/// assert!(distances[0][0] < distances[0][1]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestNeighbors {
    n_neighbors: usize,
    data: Option<Matrix<f32>>,
}

impl Default for NearestNeighbors {
    fn default() -> Self {
        Self::new(DEFAULT_N_NEIGHBORS)
    }
}

impl NearestNeighbors {
    /// Creates an index returning up to `n_neighbors` rows per query.
    #[must_use]
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors,
            data: None,
        }
    }

    /// Number of indexed rows, once fitted.
    #[must_use]
    pub fn n_indexed(&self) -> Option<usize> {
        self.data.as_ref().map(Matrix::n_rows)
    }

    /// Stores the reference rows.
    ///
    /// # Errors
    ///
    /// Returns an error when `x` is empty.
    pub fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        if x.n_rows() == 0 {
            return Err("Cannot fit NearestNeighbors on an empty matrix".into());
        }
        self.data = Some(x.clone());
        Ok(())
    }

    /// Finds the nearest indexed rows for each query row.
    ///
    /// Returns per-query cosine distances and row indices, both sorted by
    /// ascending distance with ascending row index as the tiebreak. Each list
    /// holds `min(n_neighbors, indexed rows)` entries.
    ///
    /// # Errors
    ///
    /// Returns [`EscucharError::NotFitted`] before [`NearestNeighbors::fit`]
    /// and [`EscucharError::DimensionMismatch`] when query columns differ
    /// from the indexed columns.
    pub fn kneighbors(&self, queries: &Matrix<f32>) -> Result<(Vec<Vec<f32>>, Vec<Vec<usize>>)> {
        let data = self
            .data
            .as_ref()
            .ok_or_else(|| EscucharError::not_fitted("NearestNeighbors"))?;

        let (n_queries, n_features) = queries.shape();
        if n_features != data.n_cols() {
            return Err(EscucharError::dimension_mismatch(
                "columns",
                data.n_cols(),
                n_features,
            ));
        }

        let k = self.n_neighbors.min(data.n_rows());
        let mut all_distances = Vec::with_capacity(n_queries);
        let mut all_indices = Vec::with_capacity(n_queries);

        for q in 0..n_queries {
            let query = queries.row_slice(q);
            let mut scored: Vec<(f32, usize)> = (0..data.n_rows())
                .map(|i| (cosine_distance(query, data.row_slice(i)), i))
                .collect();
            scored.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.1.cmp(&b.1))
            });
            scored.truncate(k);

            all_distances.push(scored.iter().map(|&(d, _)| d).collect());
            all_indices.push(scored.iter().map(|&(_, i)| i).collect());
        }

        Ok((all_distances, all_indices))
    }
}
