//! Catalog data model and external collaborator contracts.
//!
//! The reference catalog is a set of [`TrackRecord`]s with precomputed audio
//! descriptors, consumed either whole or as fixed-size [`Chunk`]s with stable
//! global row indices. Where the rows come from (CSV file, database, HTTP
//! pagination) is not this crate's concern: callers implement
//! [`DatasetSource`], and listener playlists arrive through [`CatalogClient`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single catalog track with its precomputed audio descriptors.
///
/// Immutable once loaded; the pipeline only reads from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Catalog identifier (e.g. the provider's track id).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Artist names; the first entry is the primary artist.
    pub artists: Vec<String>,
    /// Album name.
    pub album: String,
    /// Named numeric audio descriptors (danceability, energy, ...).
    descriptors: HashMap<String, f32>,
}

impl TrackRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        artists: Vec<String>,
        album: impl Into<String>,
        descriptors: HashMap<String, f32>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            artists,
            album: album.into(),
            descriptors,
        }
    }

    /// Returns the primary artist, or an empty string when none is listed.
    #[must_use]
    pub fn main_artist(&self) -> &str {
        self.artists.first().map_or("", String::as_str)
    }

    /// Looks up a named audio descriptor.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<f32> {
        self.descriptors.get(name).copied()
    }

    /// Joins all artist names into a single display string.
    #[must_use]
    pub fn artist_display(&self) -> String {
        self.artists.join(", ")
    }
}

/// A listener-side track stub, as fetched from a playlist.
///
/// Carries only what name+artist matching needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerTrack {
    /// Provider track id.
    pub track_id: String,
    /// Display name.
    pub name: String,
    /// Primary artist name.
    pub primary_artist: String,
}

impl ListenerTrack {
    /// Creates a new listener track stub.
    #[must_use]
    pub fn new(
        track_id: impl Into<String>,
        name: impl Into<String>,
        primary_artist: impl Into<String>,
    ) -> Self {
        Self {
            track_id: track_id.into(),
            name: name.into(),
            primary_artist: primary_artist.into(),
        }
    }
}

/// A contiguous slice of the catalog with its global starting row index.
///
/// Row `i` of the chunk is catalog row `start_index + i`; the pipeline relies
/// on these indices staying stable across repeated iterations of the source.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Global index of the first record in this chunk.
    pub start_index: usize,
    /// The records in this chunk, in catalog order.
    pub records: Vec<TrackRecord>,
}

impl Chunk {
    /// Returns the global catalog index of chunk-local row `i`.
    #[must_use]
    pub fn global_index(&self, i: usize) -> usize {
        self.start_index + i
    }

    /// Iterates records together with their global catalog indices.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &TrackRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (self.start_index + i, r))
    }

    /// Number of records in this chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the chunk holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A restartable, finite source of catalog records.
///
/// Every call to [`DatasetSource::chunks`] starts a fresh pass over the same
/// rows in the same order, so multi-pass fitting (encoder, then scaler, then
/// reducer) sees identical global indices each time.
pub trait DatasetSource {
    /// Iterates the catalog in chunks of at most `chunk_size` records.
    ///
    /// # Errors
    ///
    /// Individual items error when the underlying storage fails mid-stream.
    fn chunks(&self, chunk_size: usize) -> Box<dyn Iterator<Item = Result<Chunk>> + '_>;

    /// Loads the entire catalog at once.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying storage fails.
    fn load_all(&self) -> Result<Vec<TrackRecord>> {
        let mut all = Vec::new();
        for chunk in self.chunks(usize::MAX) {
            all.extend(chunk?.records);
        }
        Ok(all)
    }
}

/// Listener-side catalog client: the narrow contract the core consumes.
///
/// Protocol details (auth, pagination, retries) live behind this trait.
pub trait CatalogClient {
    /// Fetches the matchable track stubs of a playlist.
    ///
    /// # Errors
    ///
    /// Returns an error when the remote service fails.
    fn fetch_listener_tracks(&self, playlist_id: &str) -> Result<Vec<ListenerTrack>>;
}

/// An in-memory [`DatasetSource`], the reference implementation used in tests
/// and for catalogs that fit in memory anyway.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<TrackRecord>,
}

impl InMemorySource {
    /// Wraps a vector of records.
    #[must_use]
    pub fn new(records: Vec<TrackRecord>) -> Self {
        Self { records }
    }

    /// Number of records in the source.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the source holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DatasetSource for InMemorySource {
    fn chunks(&self, chunk_size: usize) -> Box<dyn Iterator<Item = Result<Chunk>> + '_> {
        let chunk_size = chunk_size.max(1);
        let n = self.records.len();
        let starts = (0..n).step_by(chunk_size);
        Box::new(starts.map(move |start| {
            let end = start.saturating_add(chunk_size).min(n);
            Ok(Chunk {
                start_index: start,
                records: self.records[start..end].to_vec(),
            })
        }))
    }

    fn load_all(&self) -> Result<Vec<TrackRecord>> {
        Ok(self.records.clone())
    }
}
