//! Similarity and clustering metrics.

use crate::primitives::Matrix;

/// Cosine similarity between two equal-length slices.
///
/// Returns 0.0 when either vector has (near-)zero norm, so degenerate rows
/// rank last instead of producing NaN.
///
/// # Examples
///
/// ```
/// use escuchar::metrics::cosine_similarity;
///
/// let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]);
/// assert!((sim - 1.0).abs() < 1e-6);
/// ```
///
/// # Panics
///
/// Panics if the slices have different lengths.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "vector lengths must match");
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Cosine distance: `1 - cosine_similarity`.
///
/// # Panics
///
/// Panics if the slices have different lengths.
#[must_use]
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Within-cluster sum of squared distances to assigned centroids.
///
/// # Panics
///
/// Panics if a label is out of range for the centroid matrix.
#[must_use]
pub fn inertia(x: &Matrix<f32>, centroids: &Matrix<f32>, labels: &[usize]) -> f32 {
    labels
        .iter()
        .enumerate()
        .map(|(i, &label)| (&x.row(i) - &centroids.row(label)).norm_squared())
        .sum()
}
