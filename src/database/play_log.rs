use anyhow::Result;
use chrono::Utc;
use sqlx::Row;

use super::{parse_datetime, Database};
use crate::models::{AudioFeatures, CandidateTrack, PlayEvent};

impl Database {
    /// Append a PlayEvent. Returns `None` (a benign no-op) if the track does
    /// not exist — `track-started` never errors on an unknown track id.
    pub async fn append_play_event(&self, track_id: &str) -> Result<Option<PlayEvent>> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tracks WHERE id = ?)")
            .bind(track_id)
            .fetch_one(&self.pool)
            .await?;

        if !exists {
            return Ok(None);
        }

        let now = Utc::now();
        let result = sqlx::query("INSERT INTO play_log (track_id, played_at) VALUES (?, ?)")
            .bind(track_id)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;

        Ok(Some(PlayEvent {
            id: result.last_insert_rowid(),
            track_id: track_id.to_string(),
            played_at: now,
        }))
    }

    pub async fn max_play_event_id(&self) -> Result<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM play_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(max.unwrap_or(0))
    }

    pub async fn most_recent_play_event(&self) -> Result<Option<PlayEvent>> {
        let row = sqlx::query("SELECT * FROM play_log ORDER BY played_at DESC, id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| {
            let played_at: String = r.get("played_at");
            Ok::<_, anyhow::Error>(PlayEvent {
                id: r.get("id"),
                track_id: r.get("track_id"),
                played_at: parse_datetime(&played_at)?,
            })
        })
        .transpose()
    }

    /// Number of distinct PlayEvents for tracks owned by `submitter` with
    /// PlayEvent id strictly greater than `since_log_id`.
    pub async fn plays_for_submitter_since(
        &self,
        submitter: &str,
        since_log_id: i64,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM play_log pl
            JOIN tracks t ON t.id = pl.track_id
            WHERE t.submitter = ? AND pl.id > ?
            "#,
        )
        .bind(submitter)
        .bind(since_log_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Ready tracks for `submitter`, each paired with its total play count
    /// and most recent play time — everything the rotation candidate
    /// selection step needs without N+1 queries per candidate.
    pub async fn ready_candidates_for_submitter(
        &self,
        submitter: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<CandidateTrack>> {
        let tracks = self.ready_tracks_for_submitter(submitter).await?;
        self.attach_play_stats(tracks, exclude_ids).await
    }

    pub async fn all_ready_candidates(
        &self,
        exclude_ids: &[String],
    ) -> Result<Vec<CandidateTrack>> {
        let tracks = self.list_ready_tracks().await?;
        self.attach_play_stats(tracks, exclude_ids).await
    }

    async fn attach_play_stats(
        &self,
        tracks: Vec<crate::models::Track>,
        exclude_ids: &[String],
    ) -> Result<Vec<CandidateTrack>> {
        let mut out = Vec::with_capacity(tracks.len());
        for track in tracks {
            if exclude_ids.iter().any(|id| id == &track.id) {
                continue;
            }

            let play_count: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM play_log WHERE track_id = ?")
                    .bind(&track.id)
                    .fetch_one(&self.pool)
                    .await?;

            let last_played_at: Option<String> = sqlx::query_scalar(
                "SELECT MAX(played_at) FROM play_log WHERE track_id = ?",
            )
            .bind(&track.id)
            .fetch_one(&self.pool)
            .await?;

            out.push(CandidateTrack {
                track,
                play_count,
                last_played_at: last_played_at.map(|s| parse_datetime(&s)).transpose()?,
            });
        }
        Ok(out)
    }

    /// Feature vector of the track behind the most recent PlayEvent whose
    /// track has non-null features, used by the mood policy.
    pub async fn last_played_features(&self) -> Result<Option<AudioFeatures>> {
        let row = sqlx::query(
            r#"
            SELECT t.tempo_bpm, t.rms_energy, t.spectral_centroid, t.zero_crossing_rate
            FROM play_log pl
            JOIN tracks t ON pl.track_id = t.id
            WHERE t.tempo_bpm IS NOT NULL
            ORDER BY pl.played_at DESC, pl.id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AudioFeatures {
            tempo_bpm: r.get("tempo_bpm"),
            rms_energy: r.get("rms_energy"),
            spectral_centroid: r.get("spectral_centroid"),
            zero_crossing_rate: r.get("zero_crossing_rate"),
        }))
    }

    /// The `n` most recently played distinct track ids, most recent first.
    pub async fn most_recently_played_distinct_tracks(&self, n: i64) -> Result<Vec<String>> {
        if n <= 0 {
            return Ok(Vec::new());
        }

        let rows: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT track_id FROM play_log
            GROUP BY track_id
            ORDER BY MAX(played_at) DESC
            LIMIT ?
            "#,
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
