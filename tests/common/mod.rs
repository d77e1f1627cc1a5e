use family_radio::config::DatabaseConfig;
use family_radio::database::Database;
use family_radio::models::{AudioFeatures, SourceType};

/// A freshly migrated, file-backed sqlite database scoped to the returned
/// tempfile's lifetime. The caller must keep the guard alive for as long as
/// the database is in use.
pub async fn test_db() -> (Database, tempfile::TempPath) {
    let file = tempfile::NamedTempFile::new().expect("create tempfile");
    let path = file.into_temp_path();
    let url = format!("sqlite://{}", path.display());

    let config = DatabaseConfig {
        url,
        max_connections: Some(1),
    };

    let db = Database::new(&config).await.expect("open test database");
    db.migrate().await.expect("run migrations");
    (db, path)
}

/// Submit a track and immediately mark it `ready` with the given features
/// and duration, as if the worker had already processed it.
pub async fn seed_ready_track(
    db: &Database,
    submitter: &str,
    title: &str,
    duration_s: f64,
    features: AudioFeatures,
) -> String {
    let track_id = db
        .create_track_and_job(
            title,
            "Test Artist",
            submitter,
            SourceType::Upload,
            None,
            None,
            None,
        )
        .await
        .expect("create track");

    db.set_track_ready(
        &track_id,
        &format!("/media/normalized/{track_id}.mp3"),
        Some(duration_s),
        features,
        None,
        None,
    )
    .await
    .expect("mark track ready");

    track_id
}

pub fn zero_features() -> AudioFeatures {
    AudioFeatures {
        tempo_bpm: 0.0,
        rms_energy: 0.0,
        spectral_centroid: 0.0,
        zero_crossing_rate: 0.0,
    }
}
