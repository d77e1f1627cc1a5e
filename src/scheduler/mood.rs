//! Feature-similarity ("mood") policy: picks the ready track whose normalized
//! 4-vector is closest (Euclidean) to the track behind the most recent play.
//!
//! Cold-starts (no PlayEvents yet, or the last played track has no features)
//! delegate to the rotation policy (§4.1 Mood policy, step 1).

use anyhow::Result;
use tracing::{debug, info};

use super::rotation;
use crate::database::config_store::normalize;
use crate::database::Database;
use crate::models::{AudioFeatures, Track};

pub async fn pick(db: &Database) -> Result<Option<Track>> {
    let anchor = match db.last_played_features().await? {
        Some(features) => features,
        None => {
            debug!("mood: no played track with features, delegating to rotation");
            return rotation::pick(db).await;
        }
    };

    let bounds = db.feature_bounds().await?;
    let anchor_norm = normalize_vector(&anchor, &bounds);

    let candidates = db.list_ready_tracks_with_features().await?;
    let total_candidates = candidates.len();

    // §4.1 step 3: exclude the most recent min(max(L-1, 0), 3) distinct
    // recently-played track ids, guaranteeing at least one candidate remains
    // for small libraries.
    let exclude_count = (total_candidates as i64 - 1).max(0).min(3);
    let excluded = db
        .most_recently_played_distinct_tracks(exclude_count)
        .await?;

    let mut best: Option<(Track, f64)> = None;
    for track in candidates {
        if excluded.contains(&track.id) {
            continue;
        }
        let features = match track.features {
            Some(f) => f,
            None => continue,
        };
        let norm = normalize_vector(&features, &bounds);
        let dist = euclidean_distance(&anchor_norm, &norm);

        let replace = match &best {
            Some((_, best_dist)) => dist < *best_dist,
            None => true,
        };
        if replace {
            best = Some((track, dist));
        }
    }

    match best {
        Some((track, dist)) => {
            db.set_last_returned_track_id(Some(&track.id)).await?;
            info!(track_id = %track.id, distance = dist, "mood: picked");
            Ok(Some(track))
        }
        None => {
            debug!("mood: no candidates after exclusion, delegating to rotation");
            rotation::pick(db).await
        }
    }
}

fn normalize_vector(
    features: &AudioFeatures,
    bounds: &crate::database::config_store::FeatureBounds,
) -> [f64; 4] {
    [
        normalize(features.tempo_bpm, bounds.tempo_bpm.0, bounds.tempo_bpm.1),
        normalize(
            features.rms_energy,
            bounds.rms_energy.0,
            bounds.rms_energy.1,
        ),
        normalize(
            features.spectral_centroid,
            bounds.spectral_centroid.0,
            bounds.spectral_centroid.1,
        ),
        normalize(
            features.zero_crossing_rate,
            bounds.zero_crossing_rate.0,
            bounds.zero_crossing_rate.1,
        ),
    ]
}

fn euclidean_distance(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_vectors() {
        let v = [0.5, 0.2, 0.8, 0.1];
        assert_eq!(euclidean_distance(&v, &v), 0.0);
    }

    #[test]
    fn distance_matches_pythagorean_triple_in_2d_subspace() {
        let a = [0.0, 0.0, 0.0, 0.0];
        let b = [3.0, 4.0, 0.0, 0.0];
        assert_eq!(euclidean_distance(&a, &b), 5.0);
    }
}
