//! Core traits for pipeline estimators and transformers.
//!
//! These traits define the API contracts the pipeline stages share:
//! fit once on the catalog, then apply the frozen state to query data.

use crate::error::Result;
use crate::primitives::Matrix;

/// Trait for data transformers (scalers, reducers).
///
/// A transformer is fit exactly once on the full catalog feature matrix and
/// then applied unchanged to both catalog rows and listener query rows.
///
/// ```
/// use escuchar::preprocessing::StandardScaler;
/// use escuchar::primitives::Matrix;
/// use escuchar::traits::Transformer;
///
/// let x = Matrix::from_vec(3, 1, vec![1.0, 2.0, 3.0]).unwrap();
/// let mut scaler = StandardScaler::new();
/// let scaled = scaler.fit_transform(&x).unwrap();
/// assert_eq!(scaled.shape(), (3, 1));
/// ```
pub trait Transformer {
    /// Fits the transformer to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()>;

    /// Transforms data using fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the transformer is not fitted or the input
    /// column count differs from fit-time data.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Fits and transforms in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit_transform(&mut self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Trait for unsupervised learning models.
///
/// ```
/// use escuchar::cluster::MiniBatchKMeans;
/// use escuchar::primitives::Matrix;
/// use escuchar::traits::UnsupervisedEstimator;
///
/// let data = Matrix::from_vec(6, 2, vec![
///     0.0, 0.0, 0.1, 0.1, 0.2, 0.0,
///     10.0, 10.0, 10.1, 10.1, 10.0, 10.2,
/// ]).unwrap();
///
/// let mut kmeans = MiniBatchKMeans::new(2).with_random_state(42);
/// kmeans.fit(&data).unwrap();
/// assert_eq!(kmeans.predict(&data).unwrap().len(), 6);
/// ```
pub trait UnsupervisedEstimator {
    /// The type of labels/clusters produced.
    type Labels;

    /// Fits the model to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (empty data, invalid parameters, etc.).
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()>;

    /// Predicts cluster assignments for data.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted or the input column
    /// count differs from fit-time data.
    fn predict(&self, x: &Matrix<f32>) -> Result<Self::Labels>;
}
