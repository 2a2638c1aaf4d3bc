//! Top-n recommendation assembly over nearest-neighbor retrieval.
//!
//! Two retrieval strategies: reduced-space k-NN with a dedup merge across
//! query tracks, and a raw-feature mean-cosine ranking for pipelines run
//! without a fitted reducer. Both produce a [`RecommendationSet`] whose
//! status tells the caller how the items were obtained.

use crate::catalog::TrackRecord;
use crate::error::{EscucharError, Result};
use crate::metrics::cosine_similarity;
use crate::neighbors::NearestNeighbors;
use crate::primitives::Matrix;
use log::warn;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of recommendations returned per playlist.
pub const DEFAULT_N_RECOMMENDATIONS: usize = 5;

/// A single recommended track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Catalog identifier of the recommended track.
    pub track_id: String,
    /// Display name.
    pub name: String,
    /// All artist names joined into one display string.
    pub artists: String,
    /// Album name.
    pub album: String,
    /// Relevance score (cosine similarity; 0.0 for random fallback items).
    pub score: f32,
}

/// How a [`RecommendationSet`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationStatus {
    /// Items were ranked by genuine similarity.
    Ranked,
    /// Retrieval produced nothing usable; items are a random sample.
    Degraded,
    /// No listener track matched the catalog; there is nothing to rank.
    NoMatches,
    /// The pipeline failed outright; see the logs.
    Failed,
}

/// An ordered set of recommendations plus how it was obtained.
///
/// Items are always sorted by descending score, ties broken by catalog row
/// order. Callers must check `status` before presenting the items as
/// similarity-ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    /// How the items were produced.
    pub status: RecommendationStatus,
    /// The recommended tracks, most relevant first.
    pub items: Vec<Recommendation>,
}

impl RecommendationSet {
    /// An empty set with the given status.
    #[must_use]
    pub fn empty(status: RecommendationStatus) -> Self {
        Self {
            status,
            items: Vec::new(),
        }
    }

    /// Number of recommended tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when no tracks were recommended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl fmt::Display for RecommendationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "status: {:?}", self.status)?;
        writeln!(f, "{:<30} {:<25} {:<25} {:>8}", "name", "artists", "album", "score")?;
        for item in &self.items {
            writeln!(
                f,
                "{:<30} {:<25} {:<25} {:>8.4}",
                item.name, item.artists, item.album, item.score
            )?;
        }
        Ok(())
    }
}

/// Merges per-query neighbor lists into one candidate list.
///
/// Flattens the lists in query order, drops indices outside
/// `0..catalog_len`, deduplicates preserving first-seen order and stops once
/// `n` unique candidates are collected.
#[must_use]
pub fn merge_candidates(neighbor_lists: &[Vec<usize>], catalog_len: usize, n: usize) -> Vec<usize> {
    let mut seen = vec![false; catalog_len];
    let mut merged = Vec::with_capacity(n);
    'outer: for list in neighbor_lists {
        for &idx in list {
            if idx >= catalog_len || seen[idx] {
                continue;
            }
            seen[idx] = true;
            merged.push(idx);
            if merged.len() == n {
                break 'outer;
            }
        }
    }
    merged
}

/// Reduced-space k-NN recommender over a fitted catalog.
///
/// # Examples
///
/// ```
/// use escuchar::catalog::TrackRecord;
/// use escuchar::primitives::Matrix;
/// use escuchar::recommend::{Recommender, RecommendationStatus};
/// use std::collections::HashMap;
///
/// let records: Vec<TrackRecord> = (0..3)
///     .map(|i| TrackRecord::new(format!("t{i}"), format!("Song {i}"), vec![], "", HashMap::new()))
///     .collect();
/// let reduced = Matrix::from_vec(3, 2, vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0])
///     .expect("valid matrix dimensions");
///
/// let recommender = Recommender::fit(&reduced, records, 2, 2).expect("fit should succeed");
/// let query = Matrix::from_vec(1, 2, vec![1.0, 0.1]).expect("valid matrix dimensions");
/// let set = recommender.recommend(&query).expect("recommend should succeed");
/// assert_eq!(set.status, RecommendationStatus::Ranked);
/// ```
#[derive(Debug, Clone)]
pub struct Recommender {
    index: NearestNeighbors,
    records: Vec<TrackRecord>,
    reduced: Matrix<f32>,
    n_recommendations: usize,
    random_state: Option<u64>,
}

impl Recommender {
    /// Builds the index over the catalog's reduced vectors.
    ///
    /// `records` must align row-for-row with `reduced`.
    ///
    /// # Errors
    ///
    /// Returns an error when row counts disagree or the catalog is empty.
    pub fn fit(
        reduced: &Matrix<f32>,
        records: Vec<TrackRecord>,
        n_neighbors: usize,
        n_recommendations: usize,
    ) -> Result<Self> {
        if reduced.n_rows() != records.len() {
            return Err(EscucharError::dimension_mismatch(
                "catalog rows",
                records.len(),
                reduced.n_rows(),
            ));
        }
        let mut index = NearestNeighbors::new(n_neighbors);
        index.fit(reduced)?;
        Ok(Self {
            index,
            records,
            reduced: reduced.clone(),
            n_recommendations,
            random_state: None,
        })
    }

    /// Sets the seed used by the random degraded-mode fallback.
    #[must_use]
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Number of catalog rows in the index.
    #[must_use]
    pub fn catalog_len(&self) -> usize {
        self.records.len()
    }

    /// Recommends tracks for the given query vectors (one per matched
    /// listener track).
    ///
    /// Candidates come from a per-query k-NN search merged by
    /// [`merge_candidates`]; the selected candidates are then ordered by
    /// their best similarity to any query vector. When the merge yields
    /// nothing, falls back to a uniform random sample and flags the set
    /// [`RecommendationStatus::Degraded`].
    ///
    /// # Errors
    ///
    /// Returns an error on a query column mismatch.
    pub fn recommend(&self, queries: &Matrix<f32>) -> Result<RecommendationSet> {
        if queries.n_rows() == 0 {
            return Ok(RecommendationSet::empty(RecommendationStatus::NoMatches));
        }

        let (distances, indices) = self.index.kneighbors(queries)?;
        let candidates = merge_candidates(&indices, self.records.len(), self.n_recommendations);

        if candidates.is_empty() {
            return Ok(self.random_fallback());
        }

        // Best similarity to any query vector, from the k-NN distances.
        let mut best = vec![f32::NEG_INFINITY; self.records.len()];
        for (dist_list, idx_list) in distances.iter().zip(&indices) {
            for (&d, &i) in dist_list.iter().zip(idx_list) {
                if i < best.len() {
                    best[i] = best[i].max(1.0 - d);
                }
            }
        }

        let mut scored: Vec<(usize, f32)> =
            candidates.into_iter().map(|i| (i, best[i])).collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let items = scored
            .into_iter()
            .map(|(i, score)| self.recommendation(i, score))
            .collect();
        Ok(RecommendationSet {
            status: RecommendationStatus::Ranked,
            items,
        })
    }

    fn random_fallback(&self) -> RecommendationSet {
        warn!(
            "nearest-neighbor merge produced no candidates; \
             falling back to random sampling"
        );
        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let n = self.n_recommendations.min(self.records.len());
        let mut picked: Vec<usize> =
            rand::seq::index::sample(&mut rng, self.records.len(), n).into_vec();
        picked.sort_unstable();

        let items = picked
            .into_iter()
            .map(|i| self.recommendation(i, 0.0))
            .collect();
        RecommendationSet {
            status: RecommendationStatus::Degraded,
            items,
        }
    }

    fn recommendation(&self, row: usize, score: f32) -> Recommendation {
        let record = &self.records[row];
        Recommendation {
            track_id: record.id.clone(),
            name: record.name.clone(),
            artists: record.artist_display(),
            album: record.album.clone(),
            score,
        }
    }

    /// The reduced catalog matrix backing the index.
    #[must_use]
    pub fn reduced(&self) -> &Matrix<f32> {
        &self.reduced
    }

    /// The catalog records, row-aligned with [`Recommender::reduced`].
    #[must_use]
    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }
}

/// Raw-feature retrieval: ranks catalog rows by their mean cosine similarity
/// to the query rows and returns the top `n`.
///
/// Used when the pipeline runs without a fitted reducer. `records` must
/// align row-for-row with `catalog_features`.
///
/// # Errors
///
/// Returns an error on a row-count or column mismatch.
pub fn rank_by_cosine(
    catalog_features: &Matrix<f32>,
    records: &[TrackRecord],
    query_features: &Matrix<f32>,
    n: usize,
) -> Result<RecommendationSet> {
    if catalog_features.n_rows() != records.len() {
        return Err(EscucharError::dimension_mismatch(
            "catalog rows",
            records.len(),
            catalog_features.n_rows(),
        ));
    }
    if query_features.n_cols() != catalog_features.n_cols() {
        return Err(EscucharError::dimension_mismatch(
            "columns",
            catalog_features.n_cols(),
            query_features.n_cols(),
        ));
    }
    if query_features.n_rows() == 0 {
        return Ok(RecommendationSet::empty(RecommendationStatus::NoMatches));
    }

    #[allow(clippy::cast_precision_loss)]
    let n_queries = query_features.n_rows() as f32;
    let mut scored: Vec<(usize, f32)> = (0..catalog_features.n_rows())
        .map(|i| {
            let row = catalog_features.row_slice(i);
            let total: f32 = (0..query_features.n_rows())
                .map(|q| cosine_similarity(row, query_features.row_slice(q)))
                .sum();
            (i, total / n_queries)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(n);

    let items = scored
        .into_iter()
        .map(|(i, score)| {
            let record = &records[i];
            Recommendation {
                track_id: record.id.clone(),
                name: record.name.clone(),
                artists: record.artist_display(),
                album: record.album.clone(),
                score,
            }
        })
        .collect();
    Ok(RecommendationSet {
        status: RecommendationStatus::Ranked,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn records(n: usize) -> Vec<TrackRecord> {
        (0..n)
            .map(|i| {
                TrackRecord::new(
                    format!("t{i}"),
                    format!("Song {i}"),
                    vec![format!("Artist {i}")],
                    "Album",
                    HashMap::new(),
                )
            })
            .collect()
    }

    #[test]
    fn test_merge_first_seen_order() {
        let lists = vec![vec![1, 2, 3], vec![2, 4, 5]];
        assert_eq!(merge_candidates(&lists, 10, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_merge_exhausts_without_padding() {
        let lists = vec![vec![1, 1, 1], vec![2]];
        assert_eq!(merge_candidates(&lists, 10, 5), vec![1, 2]);
    }

    #[test]
    fn test_merge_skips_out_of_range() {
        let lists = vec![vec![0, 99, 1]];
        assert_eq!(merge_candidates(&lists, 3, 5), vec![0, 1]);
    }

    #[test]
    fn test_merge_empty_input() {
        assert!(merge_candidates(&[], 10, 5).is_empty());
    }

    #[test]
    fn test_recommend_ranked_and_sorted() {
        let reduced = Matrix::from_vec(
            4,
            2,
            vec![
                1.0, 0.0, //
                0.0, 1.0, //
                0.9, 0.1, //
                -1.0, 0.0, //
            ],
        )
        .expect("sized to fit");
        let recommender = Recommender::fit(&reduced, records(4), 3, 3).expect("fit");

        let query = Matrix::from_vec(1, 2, vec![1.0, 0.05]).expect("sized to fit");
        let set = recommender.recommend(&query).expect("recommend");

        assert_eq!(set.status, RecommendationStatus::Ranked);
        assert_eq!(set.len(), 3);
        for pair in set.items.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(set.items[0].track_id, "t0");
    }

    #[test]
    fn test_recommend_dedups_across_queries() {
        let reduced = Matrix::from_vec(
            3,
            2,
            vec![
                1.0, 0.0, //
                0.99, 0.01, //
                0.98, 0.02, //
            ],
        )
        .expect("sized to fit");
        let recommender = Recommender::fit(&reduced, records(3), 3, 5).expect("fit");

        // Two nearly identical queries retrieve the same neighbors.
        let queries =
            Matrix::from_vec(2, 2, vec![1.0, 0.0, 1.0, 0.001]).expect("sized to fit");
        let set = recommender.recommend(&queries).expect("recommend");

        let mut ids: Vec<&str> = set.items.iter().map(|r| r.track_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), set.len());
    }

    #[test]
    fn test_recommend_no_queries_is_no_matches() {
        let reduced = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).expect("sized to fit");
        let recommender = Recommender::fit(&reduced, records(2), 2, 2).expect("fit");

        let empty = Matrix::from_vec(0, 2, vec![]).expect("sized to fit");
        let set = recommender.recommend(&empty).expect("recommend");
        assert_eq!(set.status, RecommendationStatus::NoMatches);
        assert!(set.is_empty());
    }

    #[test]
    fn test_random_fallback_is_degraded_and_distinct() {
        let reduced = Matrix::from_vec(
            6,
            2,
            vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.5, 0.5, 0.2, 0.8, 0.7, 0.3],
        )
        .expect("sized to fit");
        let recommender = Recommender::fit(&reduced, records(6), 2, 4)
            .expect("fit")
            .with_random_state(42);

        let set = recommender.random_fallback();
        assert_eq!(set.status, RecommendationStatus::Degraded);
        assert_eq!(set.len(), 4);
        let mut ids: Vec<&str> = set.items.iter().map(|r| r.track_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert!(set.items.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_fallback_capped_by_catalog_size() {
        let reduced = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).expect("sized to fit");
        let recommender = Recommender::fit(&reduced, records(2), 2, 5)
            .expect("fit")
            .with_random_state(1);
        assert_eq!(recommender.random_fallback().len(), 2);
    }

    #[test]
    fn test_fit_row_count_mismatch() {
        let reduced = Matrix::from_vec(3, 2, vec![0.0; 6]).expect("sized to fit");
        assert!(matches!(
            Recommender::fit(&reduced, records(2), 2, 2),
            Err(EscucharError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rank_by_cosine_top_n() {
        let catalog = Matrix::from_vec(
            4,
            2,
            vec![
                1.0, 0.0, //
                0.0, 1.0, //
                0.7, 0.7, //
                -1.0, -1.0, //
            ],
        )
        .expect("sized to fit");
        let query = Matrix::from_vec(1, 2, vec![1.0, 1.0]).expect("sized to fit");

        let set = rank_by_cosine(&catalog, &records(4), &query, 2).expect("rank");
        assert_eq!(set.status, RecommendationStatus::Ranked);
        assert_eq!(set.len(), 2);
        assert_eq!(set.items[0].track_id, "t2");
        assert!(set.items[0].score > set.items[1].score);
    }

    #[test]
    fn test_rank_by_cosine_averages_queries() {
        let catalog =
            Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).expect("sized to fit");
        // Queries aligned with each axis average to a tie; row order breaks it.
        let queries =
            Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).expect("sized to fit");
        let set = rank_by_cosine(&catalog, &records(2), &queries, 2).expect("rank");
        assert_eq!(set.items[0].track_id, "t0");
        assert!((set.items[0].score - set.items[1].score).abs() < 1e-6);
    }

    #[test]
    fn test_rank_by_cosine_empty_queries() {
        let catalog = Matrix::from_vec(2, 2, vec![1.0, 0.0, 0.0, 1.0]).expect("sized to fit");
        let empty = Matrix::from_vec(0, 2, vec![]).expect("sized to fit");
        let set = rank_by_cosine(&catalog, &records(2), &empty, 3).expect("rank");
        assert_eq!(set.status, RecommendationStatus::NoMatches);
    }

    #[test]
    fn test_display_renders_table() {
        let set = RecommendationSet {
            status: RecommendationStatus::Ranked,
            items: vec![Recommendation {
                track_id: "t0".to_string(),
                name: "Song".to_string(),
                artists: "Artist".to_string(),
                album: "Album".to_string(),
                score: 0.93,
            }],
        };
        let rendered = set.to_string();
        assert!(rendered.contains("Ranked"));
        assert!(rendered.contains("Song"));
        assert!(rendered.contains("0.93"));
    }
}
