//! Escuchar: content-based music recommendation in pure Rust.
//!
//! Escuchar turns a catalog of tracks with precomputed audio descriptors
//! into a fitted recommendation pipeline: feature extraction with a closed
//! artist vocabulary, standardization, incremental PCA, advisory clustering
//! and brute-force cosine nearest-neighbor retrieval. A listener's playlist
//! is matched against the catalog by name and artist, pushed through the
//! same fitted stages and answered with a ranked, deduplicated top-n.
//!
//! # Quick Start
//!
//! ```no_run
//! use escuchar::prelude::*;
//!
//! # fn load_catalog() -> Vec<TrackRecord> { vec![] }
//! let source = InMemorySource::new(load_catalog());
//! let config = PipelineConfig::default().with_random_state(42);
//! let pipeline = RecommendPipeline::fit(&source, config)?;
//!
//! let playlist = vec![ListenerTrack::new("s1", "Some Song", "Some Artist")];
//! let recommendations = pipeline.recommend_for_tracks(&playlist);
//! println!("{recommendations}");
//! # Ok::<(), EscucharError>(())
//! ```
//!
//! # Modules
//!
//! - [`primitives`]: Core Matrix and Vector types
//! - [`catalog`]: Track records, chunked dataset sources, playlist clients
//! - [`features`]: Feature extraction and artist encoding
//! - [`preprocessing`]: Standardization
//! - [`decomposition`]: Incremental PCA
//! - [`cluster`]: Mini-batch k-means (advisory segmentation)
//! - [`neighbors`]: Brute-force cosine k-NN
//! - [`recommend`]: Top-n assembly, dedup merge, degraded fallback
//! - [`matching`]: Listener-to-catalog track matching
//! - [`pipeline`]: End-to-end fitting, persistence and serving
//! - [`metrics`]: Cosine similarity and clustering metrics

pub mod catalog;
pub mod cluster;
pub mod decomposition;
pub mod error;
pub mod features;
pub mod matching;
pub mod metrics;
pub mod neighbors;
pub mod pipeline;
pub mod prelude;
pub mod preprocessing;
pub mod primitives;
pub mod recommend;
pub mod traits;
