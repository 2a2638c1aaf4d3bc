//! Feature extraction: raw track records to numeric feature matrices.
//!
//! Each track becomes a fixed-order row of the 11 audio descriptors plus one
//! encoded primary-artist category. The column order never changes between
//! catalog fitting and query extraction.

use crate::catalog::TrackRecord;
use crate::error::{EscucharError, Result};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The recognized numeric audio descriptors, in feature-column order.
pub const AUDIO_DESCRIPTORS: [&str; 11] = [
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
];

/// Total feature-vector length: audio descriptors plus the artist column.
pub const N_FEATURES: usize = AUDIO_DESCRIPTORS.len() + 1;

/// Integer encoding of primary-artist names.
///
/// The vocabulary is closed at fit time: artists seen during fitting get ids
/// `0..n_classes` in first-seen catalog order, and every artist encountered
/// afterwards maps to the unknown sentinel (`n_classes`). Query extraction
/// therefore never fails because of a novel artist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistEncoder {
    index: HashMap<String, usize>,
    fitted: bool,
}

impl ArtistEncoder {
    /// Creates an unfitted encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits the vocabulary from an iterator of artist names.
    pub fn fit<'a, I>(&mut self, artists: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.index.clear();
        for artist in artists {
            let next_id = self.index.len();
            self.index.entry(artist.to_string()).or_insert(next_id);
        }
        self.fitted = true;
    }

    /// Adds artists to the vocabulary during multi-chunk fitting.
    ///
    /// Call [`ArtistEncoder::freeze`] once every chunk has been observed.
    pub fn observe<'a, I>(&mut self, artists: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for artist in artists {
            let next_id = self.index.len();
            self.index.entry(artist.to_string()).or_insert(next_id);
        }
    }

    /// Closes the vocabulary after chunked observation.
    pub fn freeze(&mut self) {
        self.fitted = true;
    }

    /// Encodes an artist name; unseen names map to the unknown sentinel.
    ///
    /// # Panics
    ///
    /// Panics if the encoder is not fitted.
    #[must_use]
    pub fn encode(&self, artist: &str) -> usize {
        assert!(self.fitted, "ArtistEncoder not fitted. Call fit() first.");
        self.index.get(artist).copied().unwrap_or(self.index.len())
    }

    /// The unknown sentinel category id, fixed at fit time.
    #[must_use]
    pub fn unknown_id(&self) -> usize {
        self.index.len()
    }

    /// Number of artist classes in the fitted vocabulary.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the encoder has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.fitted
    }
}

/// Turns [`TrackRecord`]s into fixed-order numeric feature matrices.
///
/// Fit once on the full catalog (which closes the artist vocabulary); after
/// that, [`FeatureExtractor::transform`] is pure and applies the same column
/// order to catalog rows and listener query rows alike.
///
/// # Examples
///
/// ```
/// use escuchar::features::{FeatureExtractor, AUDIO_DESCRIPTORS, N_FEATURES};
/// use escuchar::catalog::TrackRecord;
/// use std::collections::HashMap;
///
/// let descriptors: HashMap<String, f32> = AUDIO_DESCRIPTORS
///     .iter()
///     .map(|d| ((*d).to_string(), 0.5))
///     .collect();
/// let track = TrackRecord::new("t1", "Song", vec!["Artist".into()], "Album", descriptors);
///
/// let mut extractor = FeatureExtractor::new();
/// let features = extractor.fit_transform(&[track]).unwrap();
/// assert_eq!(features.shape(), (1, N_FEATURES));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureExtractor {
    encoder: ArtistEncoder,
}

impl FeatureExtractor {
    /// Creates an unfitted extractor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits the artist vocabulary over the given records.
    pub fn fit(&mut self, records: &[TrackRecord]) {
        self.encoder.fit(records.iter().map(TrackRecord::main_artist));
    }

    /// Observes one chunk of the catalog during multi-pass fitting.
    pub fn observe_chunk(&mut self, records: &[TrackRecord]) {
        self.encoder
            .observe(records.iter().map(TrackRecord::main_artist));
    }

    /// Closes the artist vocabulary after chunked observation.
    pub fn freeze(&mut self) {
        self.encoder.freeze();
    }

    /// Returns true if the extractor has been fitted.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.encoder.is_fitted()
    }

    /// Access to the fitted artist encoder.
    #[must_use]
    pub fn encoder(&self) -> &ArtistEncoder {
        &self.encoder
    }

    /// Extracts the feature matrix for the given records.
    ///
    /// Missing or non-finite descriptors are a hard error naming the track
    /// and field; silent zero-fill would corrupt similarity distances.
    ///
    /// # Errors
    ///
    /// Returns [`EscucharError::NotFitted`] before fitting and
    /// [`EscucharError::MalformedRecord`] on a bad descriptor.
    pub fn transform(&self, records: &[TrackRecord]) -> Result<Matrix<f32>> {
        if !self.encoder.is_fitted() {
            return Err(EscucharError::not_fitted("FeatureExtractor"));
        }

        let mut data = Vec::with_capacity(records.len() * N_FEATURES);
        for record in records {
            for &descriptor in &AUDIO_DESCRIPTORS {
                let value = record.descriptor(descriptor).ok_or_else(|| {
                    EscucharError::MalformedRecord {
                        track_id: record.id.clone(),
                        field: descriptor.to_string(),
                    }
                })?;
                if !value.is_finite() {
                    return Err(EscucharError::MalformedRecord {
                        track_id: record.id.clone(),
                        field: descriptor.to_string(),
                    });
                }
                data.push(value);
            }
            data.push(self.encoder.encode(record.main_artist()) as f32);
        }

        Matrix::from_vec(records.len(), N_FEATURES, data).map_err(Into::into)
    }

    /// Fits and extracts in one step.
    ///
    /// # Errors
    ///
    /// Returns [`EscucharError::MalformedRecord`] on a bad descriptor.
    pub fn fit_transform(&mut self, records: &[TrackRecord]) -> Result<Matrix<f32>> {
        self.fit(records);
        self.transform(records)
    }
}
