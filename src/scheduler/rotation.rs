//! Fair round-robin rotation policy.
//!
//! Cycles through distinct submitters (sorted lexicographically) who own at
//! least one `ready` track, holding each submitter for up to
//! `rotation_tracks_per_block` consecutive picks before advancing. The loop
//! that used to recurse in the source is reshaped into a bounded `for`
//! loop over `depth` (§9 design notes: recursion in rotation).

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{debug, info};

use crate::database::Database;
use crate::models::{CandidateTrack, Track};

/// Cooldown window: once the ready library holds at least this much total
/// duration, a track played within the last hour is excluded from normal
/// picks (§4.1 Cooldown filter).
const COOLDOWN_LIBRARY_THRESHOLD_SECS: f64 = 3600.0;
const COOLDOWN_WINDOW_SECS: i64 = 3600;

pub async fn pick(db: &Database) -> Result<Option<Track>> {
    let submitters = db.distinct_ready_submitters().await?;
    if submitters.is_empty() {
        return Ok(None);
    }

    let mut idx = db.rotation_current_submitter_idx().await?;
    let n = db.rotation_tracks_per_block().await?;
    let mut block_start = db.rotation_block_start_log_id().await?;
    let last_returned = db.last_returned_track_id().await?;
    let most_recent_play = db.most_recent_play_event().await?;

    let last_returned_submitter = match &last_returned {
        Some(id) => db.get_track(id).await?.map(|t| t.submitter),
        None => None,
    };

    let len = submitters.len() as i64;

    for depth in 0..len {
        let submitter = &submitters[(idx.rem_euclid(len)) as usize];

        let mut p = db.plays_for_submitter_since(submitter, block_start).await?;
        if last_returned_submitter.as_deref() == Some(submitter.as_str()) {
            p += 1;
        }

        if p >= n {
            idx = (idx + 1).rem_euclid(len);
            block_start = db.max_play_event_id().await?;
            db.set_rotation_current_submitter_idx(idx).await?;
            db.set_rotation_block_start_log_id(block_start).await?;
            debug!(submitter, p, n, "rotation: block exhausted, advancing");
            continue;
        }

        let mut exclude: Vec<String> = Vec::new();
        if let Some(id) = &last_returned {
            exclude.push(id.clone());
        }
        if let Some(pe) = &most_recent_play {
            exclude.push(pe.track_id.clone());
        }

        let candidates = db.ready_candidates_for_submitter(submitter, &exclude).await?;
        let candidates = apply_cooldown(db, candidates).await?;

        if candidates.is_empty() {
            // §9 open question: an empty post-cooldown candidate set advances
            // the block cursor as if the block were completed.
            idx = (idx + 1).rem_euclid(len);
            block_start = db.max_play_event_id().await?;
            db.set_rotation_current_submitter_idx(idx).await?;
            db.set_rotation_block_start_log_id(block_start).await?;
            debug!(submitter, "rotation: no candidates after cooldown, advancing");
            continue;
        }

        let chosen = select_candidate(&candidates);
        db.set_last_returned_track_id(Some(&chosen.id)).await?;
        info!(track_id = %chosen.id, submitter, depth, "rotation: picked");
        return Ok(Some(chosen));
    }

    info!("rotation: all submitters exhausted this call, falling back");
    global_fallback(db, &last_returned, &most_recent_play).await
}

/// Filter out recently played tracks once the ready library is large enough
/// that starving the scheduler isn't a concern (§4.1 Cooldown filter).
async fn apply_cooldown(db: &Database, candidates: Vec<CandidateTrack>) -> Result<Vec<CandidateTrack>> {
    let total_duration = db.sum_ready_duration().await?;
    if total_duration < COOLDOWN_LIBRARY_THRESHOLD_SECS {
        return Ok(candidates);
    }

    let cutoff = Utc::now() - ChronoDuration::seconds(COOLDOWN_WINDOW_SECS);
    Ok(candidates
        .into_iter()
        .filter(|c| match c.last_played_at {
            Some(last) => last < cutoff,
            None => true,
        })
        .collect())
}

/// Zero-play candidates win uniformly; otherwise weight by `1/sqrt(plays+1)`.
fn select_candidate(candidates: &[CandidateTrack]) -> Track {
    let never_played: Vec<&CandidateTrack> = candidates.iter().filter(|c| c.play_count == 0).collect();
    if !never_played.is_empty() {
        let i = fastrand::usize(..never_played.len());
        return never_played[i].track.clone();
    }

    let weights: Vec<f64> = candidates
        .iter()
        .map(|c| 1.0 / ((c.play_count as f64 + 1.0).sqrt()))
        .collect();
    let total: f64 = weights.iter().sum();

    let mut r = fastrand::f64() * total;
    for (candidate, weight) in candidates.iter().zip(weights.iter()) {
        if r < *weight {
            return candidate.track.clone();
        }
        r -= weight;
    }

    candidates.last().expect("candidates non-empty").track.clone()
}

/// The recency-ordered tie-breaker used when rotation cannot satisfy its own
/// constraints: oldest most-recent-play first (never-played ranks earliest),
/// ties broken by earliest `submitted_at`.
async fn global_fallback(
    db: &Database,
    last_returned: &Option<String>,
    most_recent_play: &Option<crate::models::PlayEvent>,
) -> Result<Option<Track>> {
    let mut exclude: Vec<String> = Vec::new();
    if let Some(id) = last_returned {
        exclude.push(id.clone());
    }
    if let Some(pe) = most_recent_play {
        exclude.push(pe.track_id.clone());
    }

    let mut candidates = db.all_ready_candidates(&exclude).await?;
    if candidates.is_empty() {
        candidates = db.all_ready_candidates(&[]).await?;
    }
    if candidates.is_empty() {
        return Ok(None);
    }

    let chosen = candidates
        .into_iter()
        .min_by(|a, b| {
            let key = |c: &CandidateTrack| (c.last_played_at, c.track.submitted_at);
            key(a).partial_cmp(&key(b)).unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("candidates non-empty")
        .track;

    db.set_last_returned_track_id(Some(&chosen.id)).await?;
    info!(track_id = %chosen.id, "rotation: global fallback picked");
    Ok(Some(chosen))
}
