//! End-to-end recommendation pipeline.
//!
//! Fitting makes several passes over a restartable [`DatasetSource`]: one to
//! close the artist vocabulary, one to fit the scaler, one to fit the
//! reducer on scaled features, and a final transform-only pass that collects
//! the indexed catalog. Each preprocessing stage is therefore fit exactly
//! once, and query tracks later flow through the same fitted state.
//!
//! The fitted preprocessing state is a plain value object,
//! [`FittedPipelineState`], which can be persisted and used to rebuild a
//! serving pipeline without refitting.

use crate::catalog::{CatalogClient, DatasetSource, ListenerTrack, TrackRecord};
use crate::cluster::MiniBatchKMeans;
use crate::decomposition::IncrementalPca;
use crate::error::{EscucharError, Result};
use crate::features::FeatureExtractor;
use crate::matching::MatchingEngine;
use crate::preprocessing::StandardScaler;
use crate::primitives::Matrix;
use crate::recommend::{rank_by_cosine, Recommender, RecommendationSet, RecommendationStatus};
use crate::traits::{Transformer, UnsupervisedEstimator};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Version tag written into persisted pipeline state.
pub const PIPELINE_VERSION: u32 = 1;

/// Pipeline hyperparameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records per catalog chunk during fitting passes.
    pub chunk_size: usize,
    /// Rows per incremental batch for the reducer and clusterer.
    pub batch_size: usize,
    /// Reduced dimensionality; `None` means `features - 1`.
    pub n_components: Option<usize>,
    /// Advisory cluster count; `None` disables clustering.
    pub n_clusters: Option<usize>,
    /// Neighbors retrieved per query track.
    pub n_neighbors: usize,
    /// Recommendations returned per playlist.
    pub n_recommendations: usize,
    /// When false, skip reduction and rank by raw cosine similarity over
    /// scaled features.
    pub use_reduction: bool,
    /// Seed for clustering and the degraded-mode fallback.
    pub random_state: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            batch_size: 1000,
            n_components: None,
            n_clusters: Some(crate::cluster::DEFAULT_N_CLUSTERS),
            n_neighbors: crate::neighbors::DEFAULT_N_NEIGHBORS,
            n_recommendations: crate::recommend::DEFAULT_N_RECOMMENDATIONS,
            use_reduction: true,
            random_state: None,
        }
    }
}

impl PipelineConfig {
    /// Sets the catalog chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the incremental batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Sets the reduced dimensionality.
    #[must_use]
    pub fn with_n_components(mut self, n_components: usize) -> Self {
        self.n_components = Some(n_components);
        self
    }

    /// Sets the advisory cluster count, or disables clustering with `None`.
    #[must_use]
    pub fn with_n_clusters(mut self, n_clusters: Option<usize>) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    /// Sets the per-query neighbor count.
    #[must_use]
    pub fn with_n_neighbors(mut self, n_neighbors: usize) -> Self {
        self.n_neighbors = n_neighbors.max(1);
        self
    }

    /// Sets the number of recommendations per playlist.
    #[must_use]
    pub fn with_n_recommendations(mut self, n: usize) -> Self {
        self.n_recommendations = n.max(1);
        self
    }

    /// Enables or disables the reduction stage.
    #[must_use]
    pub fn with_reduction(mut self, use_reduction: bool) -> Self {
        self.use_reduction = use_reduction;
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

/// The fitted preprocessing stages, as one persistable value.
///
/// Every downstream call receives this by reference; there is no ambient
/// fitted state anywhere in the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipelineState {
    /// Version tag; load refuses a mismatch.
    pub version: u32,
    /// Fitted feature extractor (closed artist vocabulary).
    pub extractor: FeatureExtractor,
    /// Fitted scaler.
    pub scaler: StandardScaler,
    /// Fitted reducer, absent when the pipeline ran without reduction.
    pub reducer: Option<IncrementalPca>,
}

impl FittedPipelineState {
    /// Writes the state as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written or serialized.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| EscucharError::Serialization(e.to_string()))
    }

    /// Reads previously saved state, refusing a version mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed, or carries a
    /// different [`PIPELINE_VERSION`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let state: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| EscucharError::Serialization(e.to_string()))?;
        if state.version != PIPELINE_VERSION {
            return Err(EscucharError::Serialization(format!(
                "pipeline state version mismatch: expected {PIPELINE_VERSION}, found {}",
                state.version
            )));
        }
        Ok(state)
    }
}

/// The fitted retrieval backend.
#[derive(Debug, Clone)]
enum Retrieval {
    /// Reduced-space k-NN index.
    Reduced(Recommender),
    /// Scaled-feature cosine ranking, used without a fitted reducer.
    Raw {
        features: Matrix<f32>,
        records: Vec<TrackRecord>,
    },
}

impl Retrieval {
    fn records(&self) -> &[TrackRecord] {
        match self {
            Self::Reduced(recommender) => recommender.records(),
            Self::Raw { records, .. } => records,
        }
    }
}

/// A fully fitted recommendation pipeline.
///
/// # Examples
///
/// ```no_run
/// use escuchar::catalog::{InMemorySource, ListenerTrack};
/// use escuchar::pipeline::{PipelineConfig, RecommendPipeline};
///
/// # fn load_catalog() -> Vec<escuchar::catalog::TrackRecord> { vec![] }
/// let source = InMemorySource::new(load_catalog());
/// let config = PipelineConfig::default().with_random_state(42);
/// let pipeline = RecommendPipeline::fit(&source, config)?;
///
/// let playlist = vec![ListenerTrack::new("s1", "Some Song", "Some Artist")];
/// let set = pipeline.recommend_for_tracks(&playlist);
/// println!("{set}");
/// # Ok::<(), escuchar::error::EscucharError>(())
/// ```
#[derive(Debug)]
pub struct RecommendPipeline {
    config: PipelineConfig,
    state: FittedPipelineState,
    retrieval: Retrieval,
    cluster_assignments: Option<Vec<usize>>,
}

impl RecommendPipeline {
    /// Fits every stage over the source and builds the retrieval index.
    ///
    /// # Errors
    ///
    /// Returns an error when the source is empty, a record is malformed, or
    /// any stage rejects its hyperparameters.
    pub fn fit(source: &dyn DatasetSource, config: PipelineConfig) -> Result<Self> {
        // Pass 1: close the artist vocabulary.
        let mut extractor = FeatureExtractor::new();
        let mut n_records = 0usize;
        for chunk in source.chunks(config.chunk_size) {
            let chunk = chunk?;
            n_records += chunk.len();
            extractor.observe_chunk(&chunk.records);
        }
        extractor.freeze();
        if n_records == 0 {
            return Err("Cannot fit the pipeline on an empty catalog".into());
        }
        info!(
            "catalog pass complete: {n_records} records, {} artists",
            extractor.encoder().n_classes()
        );

        // Pass 2: scaler statistics.
        let mut scaler = StandardScaler::new();
        for chunk in source.chunks(config.chunk_size) {
            let features = extractor.transform(&chunk?.records)?;
            scaler.partial_fit(&features)?;
        }

        // Pass 3: reducer, on scaled features.
        let reducer = if config.use_reduction {
            let mut pca =
                IncrementalPca::new(config.n_components).with_batch_size(config.batch_size);
            for chunk in source.chunks(config.chunk_size) {
                let features = extractor.transform(&chunk?.records)?;
                pca.partial_fit(&scaler.transform(&features)?)?;
            }
            Some(pca)
        } else {
            None
        };

        let state = FittedPipelineState {
            version: PIPELINE_VERSION,
            extractor,
            scaler,
            reducer,
        };
        Self::assemble(source, config, state)
    }

    /// Rebuilds a serving pipeline from persisted state, without refitting.
    ///
    /// The source must be the catalog the state was fitted on (or a
    /// compatible snapshot); only transform passes run.
    ///
    /// # Errors
    ///
    /// Returns an error on a state version mismatch or a transform failure.
    pub fn rebuild(
        source: &dyn DatasetSource,
        config: PipelineConfig,
        state: FittedPipelineState,
    ) -> Result<Self> {
        if state.version != PIPELINE_VERSION {
            return Err(EscucharError::Serialization(format!(
                "pipeline state version mismatch: expected {PIPELINE_VERSION}, found {}",
                state.version
            )));
        }
        Self::assemble(source, config, state)
    }

    /// Final transform-only pass: collects the indexed catalog, fits the
    /// advisory clusterer and builds the retrieval backend.
    fn assemble(
        source: &dyn DatasetSource,
        config: PipelineConfig,
        state: FittedPipelineState,
    ) -> Result<Self> {
        let mut blocks = Vec::new();
        let mut records = Vec::new();
        for chunk in source.chunks(config.chunk_size) {
            let chunk = chunk?;
            let features = state.extractor.transform(&chunk.records)?;
            let scaled = state.scaler.transform(&features)?;
            let block = match &state.reducer {
                Some(reducer) => reducer.transform(&scaled)?,
                None => scaled,
            };
            blocks.push(block);
            records.extend(chunk.records);
        }
        let matrix = Matrix::vstack(&blocks)?;

        // Advisory segmentation; nothing downstream consumes it, so a
        // failure here degrades to "no assignments" instead of failing fit.
        let cluster_assignments = match config.n_clusters {
            Some(k) if k > 0 && k <= matrix.n_rows() => {
                let mut kmeans = MiniBatchKMeans::new(k).with_batch_size(config.batch_size);
                if let Some(seed) = config.random_state {
                    kmeans = kmeans.with_random_state(seed);
                }
                match kmeans.fit(&matrix).and_then(|()| kmeans.predict(&matrix)) {
                    Ok(labels) => Some(labels),
                    Err(err) => {
                        warn!("advisory clustering failed: {err}");
                        None
                    }
                }
            }
            Some(k) => {
                debug!("skipping clustering: n_clusters={k}, catalog={}", matrix.n_rows());
                None
            }
            None => None,
        };

        let retrieval = if state.reducer.is_some() {
            let mut recommender = Recommender::fit(
                &matrix,
                records,
                config.n_neighbors,
                config.n_recommendations,
            )?;
            if let Some(seed) = config.random_state {
                recommender = recommender.with_random_state(seed);
            }
            Retrieval::Reduced(recommender)
        } else {
            Retrieval::Raw {
                features: matrix,
                records,
            }
        };

        Ok(Self {
            config,
            state,
            retrieval,
            cluster_assignments,
        })
    }

    /// The fitted preprocessing state, for persistence.
    #[must_use]
    pub fn state(&self) -> &FittedPipelineState {
        &self.state
    }

    /// Advisory cluster label per catalog row, when clustering ran.
    #[must_use]
    pub fn cluster_assignments(&self) -> Option<&[usize]> {
        self.cluster_assignments.as_deref()
    }

    /// Number of catalog rows behind the index.
    #[must_use]
    pub fn catalog_len(&self) -> usize {
        self.retrieval.records().len()
    }

    /// Recommends tracks for a listener's track list.
    ///
    /// Never returns an error: failures are logged and surfaced as an empty
    /// set with [`RecommendationStatus::Failed`], and a playlist with no
    /// catalog matches yields [`RecommendationStatus::NoMatches`].
    pub fn recommend_for_tracks(&self, tracks: &[ListenerTrack]) -> RecommendationSet {
        match self.try_recommend(tracks) {
            Ok(set) => set,
            Err(err) => {
                error!("recommendation failed: {err}");
                RecommendationSet::empty(RecommendationStatus::Failed)
            }
        }
    }

    /// Fetches a playlist through the client and recommends for it.
    pub fn recommend_for_playlist(
        &self,
        client: &dyn CatalogClient,
        playlist_id: &str,
    ) -> RecommendationSet {
        match client.fetch_listener_tracks(playlist_id) {
            Ok(tracks) => self.recommend_for_tracks(&tracks),
            Err(err) => {
                error!("fetching playlist '{playlist_id}' failed: {err}");
                RecommendationSet::empty(RecommendationStatus::Failed)
            }
        }
    }

    fn try_recommend(&self, tracks: &[ListenerTrack]) -> Result<RecommendationSet> {
        let mut engine = MatchingEngine::new(tracks.to_vec());
        engine.scan_records(0, self.retrieval.records());
        let matches = engine.into_matches();
        if matches.is_empty() {
            return Ok(RecommendationSet::empty(RecommendationStatus::NoMatches));
        }
        debug!("matched {} of {} listener tracks", matches.len(), tracks.len());

        let query_records: Vec<TrackRecord> =
            matches.into_iter().map(|m| m.record).collect();
        let features = self.state.extractor.transform(&query_records)?;
        let scaled = self.state.scaler.transform(&features)?;

        match &self.retrieval {
            Retrieval::Reduced(recommender) => {
                let reducer = self
                    .state
                    .reducer
                    .as_ref()
                    .ok_or_else(|| EscucharError::not_fitted("reducer"))?;
                recommender.recommend(&reducer.transform(&scaled)?)
            }
            Retrieval::Raw { features, records } => rank_by_cosine(
                features,
                records,
                &scaled,
                self.config.n_recommendations,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemorySource;
    use crate::features::AUDIO_DESCRIPTORS;
    use std::collections::HashMap;

    fn synthetic_catalog(n: usize) -> Vec<TrackRecord> {
        let mut state = 0x1357_9bdf_u64;
        let mut next = || {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (state >> 33) as f32 / (1u64 << 31) as f32
        };
        (0..n)
            .map(|i| {
                let descriptors: HashMap<String, f32> = AUDIO_DESCRIPTORS
                    .iter()
                    .map(|d| ((*d).to_string(), next()))
                    .collect();
                TrackRecord::new(
                    format!("t{i}"),
                    format!("Song {i}"),
                    vec![format!("Artist {}", i % 7)],
                    format!("Album {}", i % 4),
                    descriptors,
                )
            })
            .collect()
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
            .with_chunk_size(16)
            .with_n_components(5)
            .with_random_state(42)
    }

    #[test]
    fn test_fit_and_recommend_end_to_end() {
        let catalog = synthetic_catalog(60);
        let source = InMemorySource::new(catalog);
        let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

        assert_eq!(pipeline.catalog_len(), 60);

        let playlist = vec![
            ListenerTrack::new("s1", "song 3", "artist 3"),
            ListenerTrack::new("s2", "SONG 10", "ARTIST 3"),
        ];
        let set = pipeline.recommend_for_tracks(&playlist);
        assert_eq!(set.status, RecommendationStatus::Ranked);
        assert_eq!(set.len(), 5);
        for pair in set.items.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_no_matches_status() {
        let source = InMemorySource::new(synthetic_catalog(30));
        let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

        let playlist = vec![ListenerTrack::new("s1", "Unknown Song", "Unknown Artist")];
        let set = pipeline.recommend_for_tracks(&playlist);
        assert_eq!(set.status, RecommendationStatus::NoMatches);
        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let source = InMemorySource::new(vec![]);
        assert!(RecommendPipeline::fit(&source, config()).is_err());
    }

    #[test]
    fn test_raw_mode_without_reducer() {
        let source = InMemorySource::new(synthetic_catalog(30));
        let pipeline =
            RecommendPipeline::fit(&source, config().with_reduction(false)).expect("fit");

        assert!(pipeline.state().reducer.is_none());
        let playlist = vec![ListenerTrack::new("s1", "Song 5", "Artist 5")];
        let set = pipeline.recommend_for_tracks(&playlist);
        assert_eq!(set.status, RecommendationStatus::Ranked);
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn test_cluster_assignments_cover_catalog() {
        let source = InMemorySource::new(synthetic_catalog(40));
        let pipeline = RecommendPipeline::fit(
            &source,
            config().with_n_clusters(Some(4)),
        )
        .expect("fit");

        let labels = pipeline.cluster_assignments().expect("clustering ran");
        assert_eq!(labels.len(), 40);
        assert!(labels.iter().all(|&l| l < 4));
    }

    #[test]
    fn test_clustering_disabled() {
        let source = InMemorySource::new(synthetic_catalog(20));
        let pipeline = RecommendPipeline::fit(
            &source,
            config().with_n_clusters(None),
        )
        .expect("fit");
        assert!(pipeline.cluster_assignments().is_none());
    }

    #[test]
    fn test_oversized_cluster_count_skipped_not_fatal() {
        let source = InMemorySource::new(synthetic_catalog(5));
        let pipeline = RecommendPipeline::fit(
            &source,
            config().with_n_clusters(Some(50)),
        )
        .expect("fit still succeeds");
        assert!(pipeline.cluster_assignments().is_none());
    }

    #[test]
    fn test_chunked_fit_matches_whole_fit() {
        let catalog = synthetic_catalog(50);
        let chunked = RecommendPipeline::fit(
            &InMemorySource::new(catalog.clone()),
            config().with_chunk_size(7),
        )
        .expect("fit");
        let whole = RecommendPipeline::fit(
            &InMemorySource::new(catalog),
            config().with_chunk_size(1000),
        )
        .expect("fit");

        let playlist = vec![ListenerTrack::new("s1", "Song 12", "Artist 5")];
        let a = chunked.recommend_for_tracks(&playlist);
        let b = whole.recommend_for_tracks(&playlist);
        assert_eq!(a.status, RecommendationStatus::Ranked);
        let ids_a: Vec<&str> = a.items.iter().map(|r| r.track_id.as_str()).collect();
        let ids_b: Vec<&str> = b.items.iter().map(|r| r.track_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_rebuild_from_state_matches_fit() {
        let catalog = synthetic_catalog(40);
        let source = InMemorySource::new(catalog);
        let fitted = RecommendPipeline::fit(&source, config()).expect("fit");

        let rebuilt =
            RecommendPipeline::rebuild(&source, config(), fitted.state().clone())
                .expect("rebuild");

        let playlist = vec![ListenerTrack::new("s1", "Song 8", "Artist 1")];
        assert_eq!(
            fitted.recommend_for_tracks(&playlist),
            rebuilt.recommend_for_tracks(&playlist)
        );
    }

    #[test]
    fn test_rebuild_rejects_version_mismatch() {
        let source = InMemorySource::new(synthetic_catalog(20));
        let fitted = RecommendPipeline::fit(&source, config()).expect("fit");

        let mut state = fitted.state().clone();
        state.version = PIPELINE_VERSION + 1;
        assert!(matches!(
            RecommendPipeline::rebuild(&source, config(), state),
            Err(EscucharError::Serialization(_))
        ));
    }

    #[test]
    fn test_failed_playlist_fetch_is_failed_status() {
        struct BrokenClient;
        impl CatalogClient for BrokenClient {
            fn fetch_listener_tracks(&self, _: &str) -> Result<Vec<ListenerTrack>> {
                Err(EscucharError::Other("service unavailable".to_string()))
            }
        }

        let source = InMemorySource::new(synthetic_catalog(20));
        let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");
        let set = pipeline.recommend_for_playlist(&BrokenClient, "p1");
        assert_eq!(set.status, RecommendationStatus::Failed);
    }

    #[test]
    fn test_working_playlist_client() {
        struct FixedClient(Vec<ListenerTrack>);
        impl CatalogClient for FixedClient {
            fn fetch_listener_tracks(&self, _: &str) -> Result<Vec<ListenerTrack>> {
                Ok(self.0.clone())
            }
        }

        let source = InMemorySource::new(synthetic_catalog(30));
        let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

        let client = FixedClient(vec![ListenerTrack::new("s1", "Song 2", "Artist 2")]);
        let set = pipeline.recommend_for_playlist(&client, "p1");
        assert_eq!(set.status, RecommendationStatus::Ranked);
    }
}
