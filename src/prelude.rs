//! Convenience re-exports for common usage.
//!
//! # Usage
//!
//! ```
//! use escuchar::prelude::*;
//! ```

pub use crate::catalog::{
    CatalogClient, Chunk, DatasetSource, InMemorySource, ListenerTrack, TrackRecord,
};
pub use crate::cluster::MiniBatchKMeans;
pub use crate::decomposition::IncrementalPca;
pub use crate::error::{EscucharError, Result};
pub use crate::features::{ArtistEncoder, FeatureExtractor, AUDIO_DESCRIPTORS, N_FEATURES};
pub use crate::matching::{MatchedTrack, MatchingEngine};
pub use crate::metrics::{cosine_distance, cosine_similarity, inertia};
pub use crate::neighbors::NearestNeighbors;
pub use crate::pipeline::{
    FittedPipelineState, PipelineConfig, RecommendPipeline, PIPELINE_VERSION,
};
pub use crate::preprocessing::StandardScaler;
pub use crate::primitives::{Matrix, Vector};
pub use crate::recommend::{
    Recommendation, RecommendationSet, RecommendationStatus, Recommender,
};
pub use crate::traits::{Transformer, UnsupervisedEstimator};
