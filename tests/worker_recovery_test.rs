mod common;

use common::test_db;
use family_radio::models::{SourceType, TrackStatus};

#[tokio::test]
async fn recover_orphaned_processing_demotes_job_and_track_to_pending() {
    let (db, _guard) = test_db().await;

    let track_id = db
        .create_track_and_job(
            "Crash Test",
            "Test Artist",
            "alice",
            SourceType::Upload,
            None,
            None,
            None,
        )
        .await
        .expect("create track");

    let (job_id, _track) = db
        .oldest_pending_job_track()
        .await
        .expect("query pending job")
        .expect("a pending job");

    // Simulate a worker that crashed mid-job: both rows parked in
    // `processing` with nothing left to advance them.
    db.set_track_processing(&track_id).await.unwrap();
    db.set_job_processing(job_id).await.unwrap();

    let recovered = db.recover_orphaned_processing().await.unwrap();
    assert_eq!(recovered, 1);

    let track = db.get_track(&track_id).await.unwrap().expect("track exists");
    assert_eq!(track.status, TrackStatus::Pending);

    let (reclaimed_job_id, reclaimed_track) = db
        .oldest_pending_job_track()
        .await
        .unwrap()
        .expect("job is pending again");
    assert_eq!(reclaimed_job_id, job_id);
    assert_eq!(reclaimed_track.id, track_id);
}

#[tokio::test]
async fn recover_orphaned_processing_is_a_no_op_when_nothing_is_stuck() {
    let (db, _guard) = test_db().await;

    let recovered = db.recover_orphaned_processing().await.unwrap();
    assert_eq!(recovered, 0);
}
