//! Core domain types shared across the database, scheduler, worker, and web layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a track's raw audio was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Upload,
    Youtube,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Upload => "upload",
            SourceType::Youtube => "youtube",
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(SourceType::Upload),
            "youtube" => Ok(SourceType::Youtube),
            other => Err(anyhow::anyhow!("unknown source_type: {other}")),
        }
    }
}

/// Lifecycle state of a [`Track`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Pending => "pending",
            TrackStatus::Processing => "processing",
            TrackStatus::Ready => "ready",
            TrackStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TrackStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TrackStatus::Pending),
            "processing" => Ok(TrackStatus::Processing),
            "ready" => Ok(TrackStatus::Ready),
            "failed" => Ok(TrackStatus::Failed),
            other => Err(anyhow::anyhow!("unknown track status: {other}")),
        }
    }
}

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            other => Err(anyhow::anyhow!("unknown job status: {other}")),
        }
    }
}

/// Active scheduling policy, held as the `programming_mode` config key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProgrammingMode {
    Rotation,
    Mood,
}

impl ProgrammingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgrammingMode::Rotation => "rotation",
            ProgrammingMode::Mood => "mood",
        }
    }
}

impl std::str::FromStr for ProgrammingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotation" => Ok(ProgrammingMode::Rotation),
            "mood" => Ok(ProgrammingMode::Mood),
            other => Err(anyhow::anyhow!("unknown programming_mode: {other}")),
        }
    }
}

/// The four-dimensional audio feature vector extracted from a normalized track.
///
/// Ordering is fixed: (tempo_bpm, rms_energy, spectral_centroid, zero_crossing_rate).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AudioFeatures {
    pub tempo_bpm: f64,
    pub rms_energy: f64,
    pub spectral_centroid: f64,
    pub zero_crossing_rate: f64,
}

impl AudioFeatures {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.tempo_bpm,
            self.rms_energy,
            self.spectral_centroid,
            self.zero_crossing_rate,
        ]
    }
}

/// A submitted song: identity, provenance, and (once ready) its normalized asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub submitter: String,
    pub source_type: SourceType,
    pub source_url: Option<String>,
    pub video_id: Option<String>,
    pub file_path: Option<String>,
    pub duration_s: Option<f64>,
    pub features: Option<AudioFeatures>,
    pub status: TrackStatus,
    pub error_msg: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub ready_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

/// A unit of ingestion work tied 1:1 to a non-terminal [`Track`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub track_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_msg: Option<String>,
}

/// An append-only record that a track started playing on the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayEvent {
    pub id: i64,
    pub track_id: String,
    pub played_at: DateTime<Utc>,
}

/// A ready track paired with the information the scheduler needs about its play
/// history, without re-querying `play_log` per candidate.
#[derive(Debug, Clone)]
pub struct CandidateTrack {
    pub track: Track,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
}

/// Live progress of the ingestion worker, broadcast for observability/status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerProgress {
    pub job_id: i64,
    pub track_id: String,
    pub state: WorkerState,
    pub step: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Fetching,
    Transcoding,
    Analyzing,
    Done,
    Error,
}

/// Result of fetching a track's raw audio, whether from disk (upload) or a
/// remote downloader (youtube).
#[derive(Debug, Clone)]
pub struct FetchedAudio {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub raw_path: std::path::PathBuf,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub track_id: String,
    pub status: &'static str,
}

/// Lightweight aggregate counts for the `/status` boundary endpoint.
#[derive(Debug, Serialize)]
pub struct LibraryStatus {
    pub pending: i64,
    pub processing: i64,
    pub ready: i64,
    pub failed: i64,
    pub programming_mode: String,
}

#[derive(Debug, Serialize)]
pub struct SubmitterSummary {
    pub submitter: String,
    pub track_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_round_trips() {
        assert_eq!("upload".parse::<SourceType>().unwrap(), SourceType::Upload);
        assert_eq!(
            "youtube".parse::<SourceType>().unwrap(),
            SourceType::Youtube
        );
        assert!("spotify".parse::<SourceType>().is_err());
    }

    #[test]
    fn track_status_round_trips() {
        for s in ["pending", "processing", "ready", "failed"] {
            assert_eq!(s.parse::<TrackStatus>().unwrap().as_str(), s);
        }
    }

    #[test]
    fn programming_mode_round_trips() {
        assert_eq!(
            "rotation".parse::<ProgrammingMode>().unwrap().as_str(),
            "rotation"
        );
        assert_eq!("mood".parse::<ProgrammingMode>().unwrap().as_str(), "mood");
        assert!("shuffle".parse::<ProgrammingMode>().is_err());
    }
}
