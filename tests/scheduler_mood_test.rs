mod common;

use common::{seed_ready_track, test_db};
use family_radio::models::AudioFeatures;
use family_radio::scheduler::mood;

#[tokio::test]
async fn mood_delegates_to_rotation_when_no_play_history() {
    let (db, _guard) = test_db().await;

    let feat = AudioFeatures {
        tempo_bpm: 120.0,
        rms_energy: 0.1,
        spectral_centroid: 2000.0,
        zero_crossing_rate: 0.05,
    };
    seed_ready_track(&db, "alice", "Song", 180.0, feat).await;

    // No PlayEvent exists yet, so mood must fall back to rotation rather
    // than returning None for lack of an anchor track.
    let picked = mood::pick(&db).await.unwrap();
    assert!(picked.is_some());
}

#[tokio::test]
async fn mood_picks_the_closest_feature_vector() {
    let (db, _guard) = test_db().await;

    // Widen feature bounds so normalization is meaningful.
    let anchor_features = AudioFeatures {
        tempo_bpm: 120.0,
        rms_energy: 0.5,
        spectral_centroid: 0.5,
        zero_crossing_rate: 0.5,
    };
    let close_features = AudioFeatures {
        tempo_bpm: 125.0,
        rms_energy: 0.55,
        spectral_centroid: 0.5,
        zero_crossing_rate: 0.5,
    };
    let far_features = AudioFeatures {
        tempo_bpm: 60.0,
        rms_energy: 0.0,
        spectral_centroid: 0.0,
        zero_crossing_rate: 0.0,
    };

    db.update_feature_bounds(AudioFeatures {
        tempo_bpm: 60.0,
        rms_energy: 0.0,
        spectral_centroid: 0.0,
        zero_crossing_rate: 0.0,
    })
    .await
    .unwrap();
    db.update_feature_bounds(AudioFeatures {
        tempo_bpm: 180.0,
        rms_energy: 1.0,
        spectral_centroid: 1.0,
        zero_crossing_rate: 1.0,
    })
    .await
    .unwrap();

    let anchor_id = seed_ready_track(&db, "alice", "Anchor", 180.0, anchor_features).await;
    let close_id = seed_ready_track(&db, "bob", "Close", 180.0, close_features).await;
    let _far_id = seed_ready_track(&db, "carol", "Far", 180.0, far_features).await;

    // Three ready tracks: mood excludes the min(L-1, 3) most recently played
    // distinct tracks, so seed enough play history to make `anchor` both the
    // most-recently-played (the similarity anchor) and excluded from being
    // re-picked as its own neighbor.
    db.append_play_event(&anchor_id).await.unwrap();

    let picked = mood::pick(&db).await.unwrap().expect("a track");
    assert_eq!(picked.id, close_id);
}
