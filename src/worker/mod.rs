//! Ingestion Worker: the single-consumer pipeline that turns a pending
//! [`Job`](crate::models::Job) into a ready, schedulable [`Track`].
//!
//! The poll loop follows the teacher's `tokio::select!`-gated scheduler loop
//! (`ingestor::scheduler::SchedulerService::start`): a periodic tick racing a
//! cooperative shutdown signal, so a shutdown request is observed promptly
//! whether the worker is idle or mid-backoff.

pub mod features;
pub mod media;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::database::Database;
use crate::models::{Track, WorkerProgress, WorkerState};
use media::MediaPipeline;

/// Shared, read-only snapshot of the worker's current job, if any — consumed
/// by the `/status` boundary endpoint.
pub type ProgressHandle = Arc<RwLock<Option<WorkerProgress>>>;

pub struct IngestionWorker {
    database: Database,
    config: Config,
    media: MediaPipeline,
    progress: ProgressHandle,
}

impl IngestionWorker {
    pub fn new(database: Database, config: Config) -> Self {
        let media = MediaPipeline::new(
            config.worker.downloader_bin.clone(),
            config.worker.transcoder_bin.clone(),
            config.worker.prober_bin.clone(),
            config.worker.external_process_timeout_secs,
        );
        Self {
            database,
            config,
            media,
            progress: Arc::new(RwLock::new(None)),
        }
    }

    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// §4.2: run the startup orphan-recovery step once, then the poll loop
    /// until `shutdown` is signaled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if let Err(e) = self.database.recover_orphaned_processing().await {
            error!(error = %e, "worker: startup orphan recovery failed");
        }

        let idle_poll = Duration::from_secs(self.config.worker.idle_poll_secs);
        let error_backoff = Duration::from_secs(self.config.worker.error_backoff_secs);

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.database.oldest_pending_job_track().await {
                Ok(Some((job_id, track))) => {
                    if let Err(e) = self.process_job(job_id, &track).await {
                        error!(job_id, track_id = %track.id, error = %e, "worker: job failed");
                        if Self::wait_or_shutdown(error_backoff, &mut shutdown).await {
                            break;
                        }
                    }
                }
                Ok(None) => {
                    if Self::wait_or_shutdown(idle_poll, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "worker: failed to poll for pending jobs");
                    if Self::wait_or_shutdown(error_backoff, &mut shutdown).await {
                        break;
                    }
                }
            }
        }

        info!("worker: shut down");
    }

    /// Wait out `duration` unless a shutdown is signaled first. Returns
    /// `true` if the caller should stop the loop.
    async fn wait_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            result = shutdown.changed() => result.is_err() || *shutdown.borrow(),
        }
    }

    /// §4.2 steps 1-8: fetch, transcode, extract features, widen bounds,
    /// probe duration, commit. Any failure marks the track/job failed and
    /// raises an alert when the failure looks like a known external block.
    async fn process_job(&self, job_id: i64, track: &Track) -> anyhow::Result<()> {
        self.database.set_job_processing(job_id).await?;
        self.database.set_track_processing(&track.id).await?;
        self.set_progress(job_id, track, WorkerState::Fetching, "fetching", None)
            .await;

        let outcome = self.run_pipeline(job_id, track).await;

        match outcome {
            Ok(()) => {
                self.set_progress(job_id, track, WorkerState::Done, "done", None)
                    .await;
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.database
                    .set_track_failed(&track.id, &message)
                    .await?;
                self.database.set_job_failed(job_id, &message).await?;
                self.set_progress(job_id, track, WorkerState::Error, "failed", Some(message.clone()))
                    .await;

                if let Err(alert_err) = crate::alerting::maybe_alert(
                    self.config.alerting.as_ref(),
                    &track.id,
                    &track.submitter,
                    &message,
                )
                .await
                {
                    warn!(error = %alert_err, "worker: failed to send failure alert");
                }

                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, job_id: i64, track: &Track) -> anyhow::Result<()> {
        let fetched = self
            .media
            .fetch(
                track.source_type,
                track.source_url.as_deref(),
                &track.id,
                &self.config.storage.raw_media_path,
            )
            .await?;

        self.set_progress(job_id, track, WorkerState::Transcoding, "transcoding", None)
            .await;
        let normalized_path = self
            .media
            .transcode(
                &fetched.raw_path,
                &track.id,
                &self.config.storage.normalized_media_path,
            )
            .await?;

        self.set_progress(job_id, track, WorkerState::Analyzing, "extracting features", None)
            .await;
        let extract_path = normalized_path.clone();
        let features = tokio::task::spawn_blocking(move || features::extract(&extract_path))
            .await
            .map_err(|e| anyhow::anyhow!("feature extraction task panicked: {e}"))??;

        self.database.update_feature_bounds(features).await?;

        let duration_s = self.media.probe_duration(&normalized_path).await?;

        let file_path = normalized_path
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("normalized path is not valid UTF-8"))?;

        self.database
            .set_track_ready(
                &track.id,
                file_path,
                duration_s,
                features,
                fetched.title.as_deref(),
                fetched.artist.as_deref(),
            )
            .await?;
        self.database.set_job_done(job_id).await?;

        Ok(())
    }

    async fn set_progress(
        &self,
        job_id: i64,
        track: &Track,
        state: WorkerState,
        step: &str,
        error: Option<String>,
    ) {
        let now = Utc::now();
        let mut guard = self.progress.write().await;
        let started_at = guard
            .as_ref()
            .filter(|p| p.job_id == job_id)
            .map(|p| p.started_at)
            .unwrap_or(now);
        let completed_at = matches!(state, WorkerState::Done | WorkerState::Error).then_some(now);
        *guard = Some(WorkerProgress {
            job_id,
            track_id: track.id.clone(),
            state,
            step: step.to_string(),
            started_at,
            updated_at: now,
            completed_at,
            error,
        });
    }
}
