//! Reconciles a listener's track list against the catalog.
//!
//! Matching is case-insensitive equality on name and primary artist, first
//! catalog hit wins. The scan is O(listener_tracks x catalog_rows), which is
//! fine because playlists are small; chunking bounds memory, not the
//! asymptotics.

use crate::catalog::{Chunk, ListenerTrack, TrackRecord};
use log::debug;

/// A listener track resolved to a concrete catalog row.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedTrack {
    /// Global catalog row index of the match.
    pub row_index: usize,
    /// The matched catalog record.
    pub record: TrackRecord,
}

/// Scans catalog chunks for the listener's tracks.
///
/// Feed every chunk of one catalog pass through
/// [`MatchingEngine::scan_chunk`], then collect with
/// [`MatchingEngine::into_matches`]. Targets that never match are dropped
/// from the output (with a debug log), per-target first match wins.
///
/// # Examples
///
/// ```
/// use escuchar::catalog::{Chunk, ListenerTrack, TrackRecord};
/// use escuchar::matching::MatchingEngine;
/// use std::collections::HashMap;
///
/// let listener = vec![ListenerTrack::new("s1", "song a", "ARTIST X")];
/// let catalog = vec![TrackRecord::new(
///     "t9", "Song A", vec!["Artist X".into()], "Album", HashMap::new(),
/// )];
///
/// let mut engine = MatchingEngine::new(listener);
/// engine.scan_chunk(&Chunk { start_index: 0, records: catalog });
/// let matches = engine.into_matches();
/// assert_eq!(matches[0].row_index, 0);
/// assert_eq!(matches[0].record.id, "t9");
/// ```
#[derive(Debug)]
pub struct MatchingEngine {
    targets: Vec<ListenerTrack>,
    matched: Vec<Option<MatchedTrack>>,
}

impl MatchingEngine {
    /// Creates an engine looking for the given listener tracks.
    #[must_use]
    pub fn new(targets: Vec<ListenerTrack>) -> Self {
        let matched = vec![None; targets.len()];
        Self { targets, matched }
    }

    /// Scans one catalog chunk, filling in any still-unmatched targets.
    pub fn scan_chunk(&mut self, chunk: &Chunk) {
        self.scan_records(chunk.start_index, &chunk.records);
    }

    /// Scans a record slice whose first row has the given global index.
    pub fn scan_records(&mut self, start_index: usize, records: &[TrackRecord]) {
        if self.is_complete() {
            return;
        }
        for (offset, record) in records.iter().enumerate() {
            let row_index = start_index + offset;
            for (t, target) in self.targets.iter().enumerate() {
                if self.matched[t].is_some() {
                    continue;
                }
                if target.name.eq_ignore_ascii_case(&record.name)
                    && target.primary_artist.eq_ignore_ascii_case(record.main_artist())
                {
                    self.matched[t] = Some(MatchedTrack {
                        row_index,
                        record: record.clone(),
                    });
                }
            }
        }
    }

    /// Returns true once every target has a match.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.matched.iter().all(Option::is_some)
    }

    /// Number of targets matched so far.
    #[must_use]
    pub fn n_matched(&self) -> usize {
        self.matched.iter().filter(|m| m.is_some()).count()
    }

    /// Consumes the engine, returning matches in listener-track order.
    ///
    /// Unmatched targets are dropped.
    #[must_use]
    pub fn into_matches(self) -> Vec<MatchedTrack> {
        self.targets
            .iter()
            .zip(self.matched)
            .filter_map(|(target, matched)| {
                if matched.is_none() {
                    debug!(
                        "no catalog match for listener track '{}' by '{}'",
                        target.name, target.primary_artist
                    );
                }
                matched
            })
            .collect()
    }
}
