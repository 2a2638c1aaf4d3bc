//! End-to-end pipeline scenarios: fit, recommend, persist, rebuild.

use escuchar::prelude::*;
use std::collections::HashMap;

fn synthetic_catalog(n: usize) -> Vec<TrackRecord> {
    let mut state = 0xdead_beef_u64;
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
                format!("track-{i}"),
                format!("Song {i}"),
                vec![format!("Artist {}", i % 9)],
                format!("Album {}", i % 5),
                descriptors,
            )
        })
        .collect()
}

fn config() -> PipelineConfig {
    PipelineConfig::default()
        .with_chunk_size(25)
        .with_n_components(5)
        .with_n_neighbors(10)
        .with_n_recommendations(5)
        .with_random_state(7)
}

#[test]
fn hundred_track_catalog_yields_five_ranked_recommendations() {
    let catalog = synthetic_catalog(100);
    let source = InMemorySource::new(catalog.clone());
    let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

    let playlist = vec![
        ListenerTrack::new("s1", "song 4", "artist 4"),
        ListenerTrack::new("s2", "Song 17", "Artist 8"),
        ListenerTrack::new("s3", "SONG 42", "ARTIST 6"),
    ];
    let set = pipeline.recommend_for_tracks(&playlist);

    assert_eq!(set.status, RecommendationStatus::Ranked);
    assert_eq!(set.len(), 5);

    // Unique, sorted by descending score, all drawn from the catalog.
    let mut ids: Vec<&str> = set.items.iter().map(|r| r.track_id.as_str()).collect();
    for pair in set.items.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    let catalog_ids: Vec<String> = catalog.iter().map(|r| r.id.clone()).collect();
    for item in &set.items {
        assert!(catalog_ids.contains(&item.track_id));
    }
}

#[test]
fn recommendations_render_as_a_table() {
    let source = InMemorySource::new(synthetic_catalog(40));
    let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

    let playlist = vec![ListenerTrack::new("s1", "Song 3", "Artist 3")];
    let rendered = pipeline.recommend_for_tracks(&playlist).to_string();
    assert!(rendered.contains("name"));
    assert!(rendered.contains("score"));
}

#[test]
fn persisted_state_round_trips_and_serves_identically() {
    let catalog = synthetic_catalog(60);
    let source = InMemorySource::new(catalog);
    let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("pipeline_state.json");
    pipeline.state().save(&path).expect("save");

    let state = FittedPipelineState::load(&path).expect("load");
    let rebuilt = RecommendPipeline::rebuild(&source, config(), state).expect("rebuild");

    let playlist = vec![
        ListenerTrack::new("s1", "Song 11", "Artist 2"),
        ListenerTrack::new("s2", "Song 30", "Artist 3"),
    ];
    assert_eq!(
        pipeline.recommend_for_tracks(&playlist),
        rebuilt.recommend_for_tracks(&playlist)
    );
}

#[test]
fn load_rejects_foreign_version() {
    let source = InMemorySource::new(synthetic_catalog(30));
    let pipeline = RecommendPipeline::fit(&source, config()).expect("fit");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("state.json");

    // Rewrite the version tag in the serialized form.
    let mut value: serde_json::Value =
        serde_json::to_value(pipeline.state()).expect("to_value");
    value["version"] = serde_json::json!(999);
    std::fs::write(&path, serde_json::to_string(&value).expect("to_string")).expect("write");

    let err = FittedPipelineState::load(&path).expect_err("version mismatch");
    assert!(matches!(err, EscucharError::Serialization(_)));
}

#[test]
fn raw_cosine_mode_serves_without_reducer() {
    let source = InMemorySource::new(synthetic_catalog(50));
    let pipeline = RecommendPipeline::fit(&source, config().with_reduction(false))
        .expect("fit");

    let playlist = vec![ListenerTrack::new("s1", "Song 20", "Artist 2")];
    let set = pipeline.recommend_for_tracks(&playlist);
    assert_eq!(set.status, RecommendationStatus::Ranked);
    assert_eq!(set.len(), 5);
    for pair in set.items.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn malformed_catalog_record_fails_fit_with_context() {
    let mut catalog = synthetic_catalog(20);
    let mut descriptors: HashMap<String, f32> = AUDIO_DESCRIPTORS
        .iter()
        .map(|d| ((*d).to_string(), 0.5))
        .collect();
    descriptors.remove("tempo");
    catalog.push(TrackRecord::new(
        "broken",
        "Broken Song",
        vec!["Artist".to_string()],
        "Album",
        descriptors,
    ));

    let err = RecommendPipeline::fit(&InMemorySource::new(catalog), config())
        .expect_err("malformed record");
    match err {
        EscucharError::MalformedRecord { track_id, field } => {
            assert_eq!(track_id, "broken");
            assert_eq!(field, "tempo");
        }
        other => panic!("expected MalformedRecord, got {other:?}"),
    }
}
