//! External-process collaborators: the downloader (remote sources), the
//! transcoder (canonical MP3 production), and the prober (duration query).
//!
//! Grounded on the teacher's `StreamProber` (`tokio::process::Command` +
//! `tokio::time::timeout`, stderr captured on failure): §4.4 Media Pipeline.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::Result;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::types::{truncate_tail, WorkerError};
use crate::models::{FetchedAudio, SourceType};

const STDERR_TAIL_BYTES: usize = 500;

/// Extensions probed, in order, when resolving a track's raw file on disk —
/// covers both direct uploads and whatever the youtube downloader produces.
/// Wider than the submit boundary's own allow-list
/// (`web::handlers::SUBMIT_ALLOWED_EXTENSIONS`), which governs what a
/// client is permitted to submit in the first place.
pub const UPLOAD_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "ogg", "aac", "webm"];

#[derive(Debug, Clone)]
pub struct MediaPipeline {
    downloader_bin: String,
    transcoder_bin: String,
    prober_bin: String,
    timeout: Duration,
}

impl MediaPipeline {
    pub fn new(downloader_bin: String, transcoder_bin: String, prober_bin: String, timeout_secs: u64) -> Self {
        Self {
            downloader_bin,
            transcoder_bin,
            prober_bin,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// §4.4 Fetch: for uploads, find the raw file by extension probe; for
    /// youtube, invoke the external downloader.
    pub async fn fetch(
        &self,
        source_type: SourceType,
        source_url: Option<&str>,
        track_id: &str,
        raw_media_dir: &Path,
    ) -> Result<FetchedAudio, WorkerError> {
        match source_type {
            SourceType::Upload => {
                for ext in UPLOAD_EXTENSIONS {
                    let candidate = raw_media_dir.join(format!("{track_id}.{ext}"));
                    if candidate.exists() {
                        return Ok(FetchedAudio {
                            title: None,
                            artist: None,
                            raw_path: candidate,
                        });
                    }
                }
                Err(WorkerError::RawFileMissing {
                    track_id: track_id.to_string(),
                })
            }
            SourceType::Youtube => {
                let url = source_url.ok_or_else(|| WorkerError::DownloadFailed {
                    message: "youtube track is missing a source_url".to_string(),
                })?;
                self.download(url, track_id, raw_media_dir).await
            }
        }
    }

    async fn download(
        &self,
        url: &str,
        track_id: &str,
        raw_media_dir: &Path,
    ) -> Result<FetchedAudio, WorkerError> {
        let output_template = raw_media_dir.join(format!("{track_id}.%(ext)s"));

        debug!(url, "worker: invoking downloader");
        let mut cmd = Command::new(&self.downloader_bin);
        cmd.args([
            "--no-playlist",
            "--extract-audio",
            "--print",
            "%(title)s\n%(uploader)s",
            "-o",
        ])
        .arg(&output_template)
        .arg(url);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| WorkerError::Timeout {
                tool: self.downloader_bin.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| WorkerError::DownloadFailed {
                message: format!("failed to spawn downloader: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::DownloadFailed {
                message: truncate_tail(&stderr, STDERR_TAIL_BYTES),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut lines = stdout.lines();
        let title = lines.next().map(str::trim).filter(|s| !s.is_empty());
        let artist = lines.next().map(str::trim).filter(|s| !s.is_empty());

        let raw_path = UPLOAD_EXTENSIONS
            .iter()
            .map(|ext| raw_media_dir.join(format!("{track_id}.{ext}")))
            .find(|p| p.exists())
            .ok_or_else(|| WorkerError::DownloadFailed {
                message: format!("downloader reported success but produced no output file for {track_id}"),
            })?;

        Ok(FetchedAudio {
            title: title.map(str::to_string),
            artist: artist.map(str::to_string),
            raw_path,
        })
    }

    /// §4.4 Transcode: produce the canonical MP3 (128 kbps CBR, 44.1 kHz,
    /// stereo, ID3v2.3 comment = track id), unlinking the raw file on success.
    pub async fn transcode(
        &self,
        raw_path: &Path,
        track_id: &str,
        normalized_media_dir: &Path,
    ) -> Result<PathBuf, WorkerError> {
        let final_path = normalized_media_dir.join(format!("{track_id}.mp3"));

        let mut cmd = Command::new(&self.transcoder_bin);
        cmd.args(["-y", "-i"])
            .arg(raw_path)
            .args([
                "-codec:a", "libmp3lame",
                "-b:a", "128k",
                "-ar", "44100",
                "-ac", "2",
                "-id3v2_version", "3",
                "-metadata", &format!("comment={track_id}"),
            ])
            .arg(&final_path);
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| WorkerError::Timeout {
                tool: self.transcoder_bin.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| WorkerError::TranscodeFailed {
                message: format!("failed to spawn transcoder: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::TranscodeFailed {
                message: truncate_tail(&stderr, STDERR_TAIL_BYTES),
            });
        }

        if let Err(e) = tokio::fs::remove_file(raw_path).await {
            warn!(track_id, error = %e, "worker: failed to unlink raw file after transcode");
        }

        Ok(final_path)
    }

    /// §4.2 step 6: query asset duration via the external prober. A first
    /// audio stream reporting `0` is treated as unknown (§9 Open Questions).
    pub async fn probe_duration(&self, path: &Path) -> Result<Option<f64>, WorkerError> {
        let mut cmd = Command::new(&self.prober_bin);
        cmd.args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_format",
        ])
        .arg(path);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| WorkerError::Timeout {
                tool: self.prober_bin.clone(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| WorkerError::ProbeFailed {
                message: format!("failed to spawn prober: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(WorkerError::ProbeFailed {
                message: truncate_tail(&stderr, STDERR_TAIL_BYTES),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let json: serde_json::Value = serde_json::from_str(&stdout).map_err(|e| WorkerError::ProbeFailed {
            message: format!("failed to parse prober output: {e}"),
        })?;

        let duration: Option<f64> = json["format"]["duration"]
            .as_str()
            .and_then(|s| s.parse().ok());

        Ok(duration.filter(|d| *d > 0.0))
    }
}
