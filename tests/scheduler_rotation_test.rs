mod common;

use common::{seed_ready_track, test_db, zero_features};
use family_radio::scheduler::rotation;

#[tokio::test]
async fn rotation_alternates_fairly_between_submitters() {
    let (db, _guard) = test_db().await;

    db.set_config("rotation_tracks_per_block", "2")
        .await
        .unwrap();

    let alice_a = seed_ready_track(&db, "alice", "Alice Song A", 180.0, zero_features()).await;
    let alice_b = seed_ready_track(&db, "alice", "Alice Song B", 180.0, zero_features()).await;
    let bob_a = seed_ready_track(&db, "bob", "Bob Song A", 180.0, zero_features()).await;
    let bob_b = seed_ready_track(&db, "bob", "Bob Song B", 180.0, zero_features()).await;

    // Block 1: alice.
    let pick1 = rotation::pick(&db).await.unwrap().expect("a track");
    assert_eq!(pick1.submitter, "alice");
    db.append_play_event(&pick1.id).await.unwrap();

    // Block exhausted for alice after 2 plays of the *same* track id would
    // still count against the block — but the exclusion rule forces variety
    // before block accounting even triggers, so the second alice pick (if
    // any) differs from the first.
    let pick2 = rotation::pick(&db).await.unwrap().expect("a track");
    assert_eq!(pick2.submitter, "bob", "block of 2 plays should rotate to bob next");
    db.append_play_event(&pick2.id).await.unwrap();

    let pick3 = rotation::pick(&db).await.unwrap().expect("a track");
    assert_eq!(pick3.submitter, "alice");
    assert_ne!(
        pick3.id, pick1.id,
        "alice's second pick this round should be her other ready track"
    );
    assert!([&alice_a, &alice_b].contains(&&pick3.id));
    db.append_play_event(&pick3.id).await.unwrap();

    let pick4 = rotation::pick(&db).await.unwrap().expect("a track");
    assert_eq!(pick4.submitter, "bob");
    assert_ne!(pick4.id, pick2.id);
    assert!([&bob_a, &bob_b].contains(&&pick4.id));
}

#[tokio::test]
async fn rotation_returns_none_when_library_empty() {
    let (db, _guard) = test_db().await;
    assert!(rotation::pick(&db).await.unwrap().is_none());
}

#[tokio::test]
async fn rotation_handles_single_submitter_above_cooldown_threshold() {
    let (db, _guard) = test_db().await;
    db.set_config("rotation_tracks_per_block", "10")
        .await
        .unwrap();

    // One submitter, enough total duration to cross the cooldown threshold,
    // and only two tracks so the recently-played one is the sole exclusion.
    let track_a = seed_ready_track(&db, "alice", "Long Song A", 2000.0, zero_features()).await;
    let track_b = seed_ready_track(&db, "alice", "Long Song B", 2000.0, zero_features()).await;

    let first = rotation::pick(&db).await.unwrap().expect("a track");
    db.append_play_event(&first.id).await.unwrap();

    let second = rotation::pick(&db).await.unwrap().expect("a track");
    assert_ne!(second.id, first.id);
    assert!([&track_a, &track_b].contains(&&second.id));
}
