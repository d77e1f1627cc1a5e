use anyhow::Result;
use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_datetime, Database};
use crate::models::*;

fn row_to_track(row: &sqlx::sqlite::SqliteRow) -> Result<Track> {
    let source_type: String = row.get("source_type");
    let status: String = row.get("status");
    let submitted_at: String = row.get("submitted_at");
    let ready_at: Option<String> = row.get("ready_at");

    let tempo_bpm: Option<f64> = row.get("tempo_bpm");
    let rms_energy: Option<f64> = row.get("rms_energy");
    let spectral_centroid: Option<f64> = row.get("spectral_centroid");
    let zero_crossing_rate: Option<f64> = row.get("zero_crossing_rate");

    let features = match (tempo_bpm, rms_energy, spectral_centroid, zero_crossing_rate) {
        (Some(tempo_bpm), Some(rms_energy), Some(spectral_centroid), Some(zero_crossing_rate)) => {
            Some(AudioFeatures {
                tempo_bpm,
                rms_energy,
                spectral_centroid,
                zero_crossing_rate,
            })
        }
        _ => None,
    };

    Ok(Track {
        id: row.get("id"),
        title: row.get("title"),
        artist: row.get("artist"),
        submitter: row.get("submitter"),
        source_type: source_type.parse()?,
        source_url: row.get("source_url"),
        video_id: row.get("video_id"),
        file_path: row.get("file_path"),
        duration_s: row.get("duration_s"),
        features,
        status: status.parse()?,
        error_msg: row.get("error_msg"),
        submitted_at: parse_datetime(&submitted_at)?,
        ready_at: ready_at.map(|s| parse_datetime(&s)).transpose()?,
        comment: row.get("comment"),
    })
}

impl Database {
    /// Insert a newly submitted track plus its pending job in one
    /// transaction, per the submit boundary contract.
    pub async fn create_track_and_job(
        &self,
        title: &str,
        artist: &str,
        submitter: &str,
        source_type: SourceType,
        source_url: Option<&str>,
        video_id: Option<&str>,
        comment: Option<&str>,
    ) -> Result<String> {
        let track_id = Uuid::new_v4().to_string();
        self.create_track_and_job_with_id(
            &track_id, title, artist, submitter, source_type, source_url, video_id, comment,
        )
        .await?;
        Ok(track_id)
    }

    /// Same as [`Self::create_track_and_job`], but with a caller-supplied id —
    /// used when the id must be known before the row exists (e.g. an upload's
    /// raw file is named by track id before the track is inserted).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_track_and_job_with_id(
        &self,
        track_id: &str,
        title: &str,
        artist: &str,
        submitter: &str,
        source_type: SourceType,
        source_url: Option<&str>,
        video_id: Option<&str>,
        comment: Option<&str>,
    ) -> Result<String> {
        let track_id = track_id.to_string();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO tracks (id, title, artist, submitter, source_type, source_url,
                                 video_id, status, submitted_at, comment)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
            "#,
        )
        .bind(&track_id)
        .bind(title)
        .bind(artist)
        .bind(submitter)
        .bind(source_type.as_str())
        .bind(source_url)
        .bind(video_id)
        .bind(&now)
        .bind(comment)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO jobs (track_id, status, created_at) VALUES (?, 'pending', ?)")
            .bind(&track_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(track_id)
    }

    pub async fn count_pending_for_submitter(&self, submitter: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tracks WHERE submitter = ? AND status IN ('pending', 'processing')",
        )
        .bind(submitter)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn get_track(&self, id: &str) -> Result<Option<Track>> {
        let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_track(&r)).transpose()
    }

    pub async fn list_ready_tracks(&self) -> Result<Vec<Track>> {
        let rows = sqlx::query("SELECT * FROM tracks WHERE status = 'ready'")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_track).collect()
    }

    pub async fn list_ready_tracks_with_features(&self) -> Result<Vec<Track>> {
        let rows = sqlx::query(
            "SELECT * FROM tracks WHERE status = 'ready' AND tempo_bpm IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_track).collect()
    }

    pub async fn distinct_ready_submitters(&self) -> Result<Vec<String>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT submitter FROM tracks WHERE status = 'ready' ORDER BY submitter",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn ready_tracks_for_submitter(&self, submitter: &str) -> Result<Vec<Track>> {
        let rows = sqlx::query(
            "SELECT * FROM tracks WHERE submitter = ? AND status = 'ready' ORDER BY submitted_at",
        )
        .bind(submitter)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_track).collect()
    }

    /// Sum of `duration_s` over ready tracks, treating a null duration as 0
    /// (§9 Open Questions: duration-parsing failures contribute 0 to Σ).
    pub async fn sum_ready_duration(&self) -> Result<f64> {
        let total: Option<f64> =
            sqlx::query_scalar("SELECT SUM(duration_s) FROM tracks WHERE status = 'ready'")
                .fetch_one(&self.pool)
                .await?;
        Ok(total.unwrap_or(0.0))
    }

    pub async fn oldest_pending_job_track(&self) -> Result<Option<(i64, Track)>> {
        let row = sqlx::query(
            r#"
            SELECT j.id as job_id, t.* FROM jobs j
            JOIN tracks t ON t.id = j.track_id
            WHERE j.status = 'pending'
            ORDER BY j.created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => {
                let job_id: i64 = r.get("job_id");
                Ok(Some((job_id, row_to_track(&r)?)))
            }
            None => Ok(None),
        }
    }

    pub async fn set_track_processing(&self, track_id: &str) -> Result<()> {
        sqlx::query("UPDATE tracks SET status = 'processing' WHERE id = ?")
            .bind(track_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_track_ready(
        &self,
        track_id: &str,
        file_path: &str,
        duration_s: Option<f64>,
        features: AudioFeatures,
        title: Option<&str>,
        artist: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let mut query = sqlx::QueryBuilder::new("UPDATE tracks SET status = 'ready', file_path = ");
        query.push_bind(file_path);
        query.push(", duration_s = ").push_bind(duration_s);
        query.push(", tempo_bpm = ").push_bind(features.tempo_bpm);
        query.push(", rms_energy = ").push_bind(features.rms_energy);
        query
            .push(", spectral_centroid = ")
            .push_bind(features.spectral_centroid);
        query
            .push(", zero_crossing_rate = ")
            .push_bind(features.zero_crossing_rate);
        query.push(", error_msg = NULL, ready_at = ").push_bind(&now);

        if let Some(title) = title {
            query.push(", title = ").push_bind(title);
        }
        if let Some(artist) = artist {
            query.push(", artist = ").push_bind(artist);
        }

        query.push(" WHERE id = ").push_bind(track_id);

        query.build().execute(&self.pool).await?;

        Ok(())
    }

    pub async fn set_track_failed(&self, track_id: &str, error_msg: &str) -> Result<()> {
        sqlx::query("UPDATE tracks SET status = 'failed', error_msg = ? WHERE id = ?")
            .bind(error_msg)
            .bind(track_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_track(&self, track_id: &str) -> Result<Option<String>> {
        let file_path: Option<String> =
            sqlx::query_scalar("SELECT file_path FROM tracks WHERE id = ?")
                .bind(track_id)
                .fetch_optional(&self.pool)
                .await?
                .flatten();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM play_log WHERE track_id = ?")
            .bind(track_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM jobs WHERE track_id = ?")
            .bind(track_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tracks WHERE id = ?")
            .bind(track_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(file_path)
    }

    pub async fn library_status_counts(&self) -> Result<(i64, i64, i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END) AS pending,
                SUM(CASE WHEN status = 'processing' THEN 1 ELSE 0 END) AS processing,
                SUM(CASE WHEN status = 'ready' THEN 1 ELSE 0 END) AS ready,
                SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END) AS failed
            FROM tracks
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((
            row.get::<Option<i64>, _>("pending").unwrap_or(0),
            row.get::<Option<i64>, _>("processing").unwrap_or(0),
            row.get::<Option<i64>, _>("ready").unwrap_or(0),
            row.get::<Option<i64>, _>("failed").unwrap_or(0),
        ))
    }

    pub async fn submitter_summaries(&self) -> Result<Vec<SubmitterSummary>> {
        let rows = sqlx::query(
            "SELECT submitter, COUNT(*) as track_count FROM tracks GROUP BY submitter ORDER BY submitter",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| SubmitterSummary {
                submitter: r.get("submitter"),
                track_count: r.get("track_count"),
            })
            .collect())
    }

    pub async fn list_tracks_recent(&self, limit: i64) -> Result<Vec<Track>> {
        let rows = sqlx::query("SELECT * FROM tracks ORDER BY submitted_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_track).collect()
    }
}
