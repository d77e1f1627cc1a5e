//! Persisted key/value configuration store.
//!
//! Per the design notes, Config is not a process global: it is a typed
//! record round-tripped through the store via a narrow getter/setter. The
//! running feature min/max bounds are read-modify-write and rely on the
//! ingestion worker staying single-consumer to avoid a race (see
//! `crate::worker`).

use anyhow::Result;

use super::Database;
use crate::models::ProgrammingMode;

impl Database {
    pub async fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn set_config(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_config_required(&self, key: &str) -> Result<String> {
        self.get_config(key)
            .await?
            .ok_or_else(|| anyhow::anyhow!("missing required config key: {key}"))
    }

    pub async fn programming_mode(&self) -> Result<ProgrammingMode> {
        let raw = self.get_config_required("programming_mode").await?;
        Ok(raw.parse()?)
    }

    pub async fn rotation_tracks_per_block(&self) -> Result<i64> {
        let raw = self
            .get_config_required("rotation_tracks_per_block")
            .await?;
        Ok(raw.parse()?)
    }

    pub async fn rotation_current_submitter_idx(&self) -> Result<i64> {
        let raw = self
            .get_config_required("rotation_current_submitter_idx")
            .await?;
        Ok(raw.parse()?)
    }

    pub async fn set_rotation_current_submitter_idx(&self, idx: i64) -> Result<()> {
        self.set_config("rotation_current_submitter_idx", &idx.to_string())
            .await
    }

    pub async fn rotation_block_start_log_id(&self) -> Result<i64> {
        let raw = self
            .get_config_required("rotation_block_start_log_id")
            .await?;
        Ok(raw.parse()?)
    }

    pub async fn set_rotation_block_start_log_id(&self, id: i64) -> Result<()> {
        self.set_config("rotation_block_start_log_id", &id.to_string())
            .await
    }

    pub async fn last_returned_track_id(&self) -> Result<Option<String>> {
        let raw = self.get_config_required("last_returned_track_id").await?;
        Ok(if raw.is_empty() { None } else { Some(raw) })
    }

    pub async fn set_last_returned_track_id(&self, track_id: Option<&str>) -> Result<()> {
        self.set_config("last_returned_track_id", track_id.unwrap_or(""))
            .await
    }

    /// Running normalization bounds for all four audio features, as
    /// `(min, max)` pairs keyed by feature name.
    pub async fn feature_bounds(&self) -> Result<FeatureBounds> {
        Ok(FeatureBounds {
            tempo_bpm: (
                self.feature_bound("min", "tempo_bpm").await?,
                self.feature_bound("max", "tempo_bpm").await?,
            ),
            rms_energy: (
                self.feature_bound("min", "rms_energy").await?,
                self.feature_bound("max", "rms_energy").await?,
            ),
            spectral_centroid: (
                self.feature_bound("min", "spectral_centroid").await?,
                self.feature_bound("max", "spectral_centroid").await?,
            ),
            zero_crossing_rate: (
                self.feature_bound("min", "zero_crossing_rate").await?,
                self.feature_bound("max", "zero_crossing_rate").await?,
            ),
        })
    }

    async fn feature_bound(&self, which: &str, name: &str) -> Result<f64> {
        let key = format!("feature_{which}_{name}");
        let raw = self.get_config_required(&key).await?;
        Ok(raw.parse()?)
    }

    /// Widen the running min/max for each feature to include `value`,
    /// persisting only the bounds that actually changed.
    pub async fn update_feature_bounds(
        &self,
        features: crate::models::AudioFeatures,
    ) -> Result<()> {
        self.widen_bound("tempo_bpm", features.tempo_bpm).await?;
        self.widen_bound("rms_energy", features.rms_energy).await?;
        self.widen_bound("spectral_centroid", features.spectral_centroid)
            .await?;
        self.widen_bound("zero_crossing_rate", features.zero_crossing_rate)
            .await?;
        Ok(())
    }

    async fn widen_bound(&self, name: &str, value: f64) -> Result<()> {
        let current_min = self.feature_bound("min", name).await?;
        let current_max = self.feature_bound("max", name).await?;

        let new_min = current_min.min(value);
        let new_max = current_max.max(value);

        if new_min != current_min {
            self.set_config(&format!("feature_min_{name}"), &new_min.to_string())
                .await?;
        }
        if new_max != current_max {
            self.set_config(&format!("feature_max_{name}"), &new_max.to_string())
                .await?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureBounds {
    pub tempo_bpm: (f64, f64),
    pub rms_energy: (f64, f64),
    pub spectral_centroid: (f64, f64),
    pub zero_crossing_rate: (f64, f64),
}

/// `x' = (x - a) / (b - a)`, or `0` when `b <= a` — the normalization law
/// pinned by the testable properties (§8, property 7).
pub fn normalize(x: f64, a: f64, b: f64) -> f64 {
    if b > a {
        (x - a) / (b - a)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_zero_range_is_zero() {
        assert_eq!(normalize(5.0, 2.0, 2.0), 0.0);
        assert_eq!(normalize(5.0, 2.0, 1.0), 0.0);
    }

    #[test]
    fn normalize_interpolates() {
        assert_eq!(normalize(5.0, 0.0, 10.0), 0.5);
        assert_eq!(normalize(0.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize(10.0, 0.0, 10.0), 1.0);
    }
}
