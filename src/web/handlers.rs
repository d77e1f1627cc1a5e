//! Public (non-admin) HTTP handlers: submission, the streaming contract, and
//! read-only library status.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::error;

use super::AppState;
use crate::models::{LibraryStatus, SourceType, SubmitResponse, SubmitterSummary, Track, WorkerProgress};
use crate::utils::youtube::extract_video_id;

/// §6: extensions accepted at the submit boundary. Distinct from
/// [`crate::worker::media::UPLOAD_EXTENSIONS`], which is the wider probe set
/// the worker scans for on disk (also covers what the youtube downloader can
/// produce).
const SUBMIT_ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "ogg", "opus"];

const MAX_SUBMITTER_LEN: usize = 50;
const MAX_COMMENT_LEN: usize = 280;

/// Trim and truncate to at most `max_chars` characters, matching the
/// original's `s.strip()[:N]` slicing (character-based, not byte-based).
fn trim_truncate(s: &str, max_chars: usize) -> String {
    s.trim().chars().take(max_chars).collect()
}

/// §6: validate and persist an uploaded audio file, creating the track in
/// `pending` status with a paired ingestion job.
pub async fn submit_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    let mut title: Option<String> = None;
    let mut artist: Option<String> = None;
    let mut submitter: Option<String> = None;
    let mut comment: Option<String> = None;
    let mut file_field: Option<(String, axum::extract::multipart::Field<'_>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" => title = Some(text_field(field).await?),
            "artist" => artist = Some(text_field(field).await?),
            "submitter" => submitter = Some(text_field(field).await?),
            "comment" => comment = Some(text_field(field).await?),
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                file_field = Some((filename, field));
            }
            _ => {}
        }
    }

    let submitter = submitter.ok_or((StatusCode::BAD_REQUEST, "missing submitter".to_string()))?;
    let submitter = trim_truncate(&submitter, MAX_SUBMITTER_LEN);
    if submitter.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missing submitter".to_string()));
    }
    let comment = comment.map(|c| trim_truncate(&c, MAX_COMMENT_LEN)).filter(|c| !c.is_empty());

    let (filename, field) = file_field.ok_or((StatusCode::BAD_REQUEST, "missing file".to_string()))?;

    let extension = std::path::Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or((StatusCode::BAD_REQUEST, "file has no extension".to_string()))?;

    if !SUBMIT_ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("unsupported file type: {extension}"),
        ));
    }

    check_pending_cap(&state, &submitter).await?;

    let track_id = uuid::Uuid::new_v4().to_string();
    let raw_path = state
        .config
        .storage
        .raw_media_path
        .join(format!("{track_id}.{extension}"));

    if let Err(e) = stream_field_to_file(field, &raw_path, state.config.storage.max_upload_bytes).await {
        let _ = tokio::fs::remove_file(&raw_path).await;
        return Err(e);
    }

    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| {
            std::path::Path::new(&filename)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&filename)
                .to_string()
        });
    let artist = artist.filter(|a| !a.trim().is_empty()).unwrap_or_else(|| submitter.clone());

    let track_id = state
        .database
        .create_track_and_job_with_id(
            &track_id,
            &title,
            &artist,
            &submitter,
            SourceType::Upload,
            None,
            None,
            comment.as_deref(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "web: failed to create track");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to submit track".to_string())
        })?;

    Ok(Json(SubmitResponse {
        track_id,
        status: "pending",
    }))
}

/// Stream a multipart field to disk in fixed-size chunks, rejecting with
/// `413` as soon as the running total exceeds `max_bytes` rather than
/// buffering the whole body first.
async fn stream_field_to_file(
    mut field: axum::extract::multipart::Field<'_>,
    dest: &std::path::Path,
    max_bytes: u64,
) -> Result<(), (StatusCode, String)> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to create file: {e}")))?;

    let mut total: u64 = 0;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("failed to read file: {e}")))?
    {
        total += chunk.len() as u64;
        if total > max_bytes {
            return Err((
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("file too large: exceeds max {max_bytes} bytes"),
            ));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to write file: {e}")))?;
    }

    Ok(())
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, (StatusCode, String)> {
    field
        .text()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("invalid form field: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct SubmitYoutubeRequest {
    pub title: String,
    pub artist: String,
    pub submitter: String,
    pub url: String,
    pub comment: Option<String>,
}

/// §6: validate a youtube URL shape (extracting the video id) and create the
/// track in `pending` status; the actual fetch happens in the worker.
pub async fn submit_youtube(
    State(state): State<AppState>,
    Json(req): Json<SubmitYoutubeRequest>,
) -> Result<Json<SubmitResponse>, (StatusCode, String)> {
    let video_id = extract_video_id(&req.url)
        .ok_or((StatusCode::BAD_REQUEST, "unrecognized youtube URL".to_string()))?;

    let submitter = trim_truncate(&req.submitter, MAX_SUBMITTER_LEN);
    if submitter.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "missing submitter".to_string()));
    }
    let comment = req
        .comment
        .as_deref()
        .map(|c| trim_truncate(c, MAX_COMMENT_LEN))
        .filter(|c| !c.is_empty());

    check_pending_cap(&state, &submitter).await?;

    let track_id = state
        .database
        .create_track_and_job(
            &req.title,
            &req.artist,
            &submitter,
            SourceType::Youtube,
            Some(&req.url),
            Some(&video_id),
            comment.as_deref(),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "web: failed to create track");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to submit track".to_string())
        })?;

    Ok(Json(SubmitResponse {
        track_id,
        status: "pending",
    }))
}

async fn check_pending_cap(state: &AppState, submitter: &str) -> Result<(), (StatusCode, String)> {
    let pending = state
        .database
        .count_pending_for_submitter(submitter)
        .await
        .map_err(|e| {
            error!(error = %e, "web: failed to count pending tracks");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        })?;

    if pending >= state.config.storage.max_pending_per_submitter {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            format!("submitter '{submitter}' already has {pending} tracks pending or processing"),
        ));
    }
    Ok(())
}

/// §6: the streaming server's poll endpoint. Always `200`, plain text — an
/// empty body means "nothing ready to play right now", never a server error.
pub async fn next_track(State(state): State<AppState>) -> (StatusCode, String) {
    match state.scheduler.next().await {
        Ok(Some(track)) => match crate::streaming::format_annotate_uri(&track) {
            Ok(uri) => (StatusCode::OK, uri),
            Err(e) => {
                error!(error = %e, track_id = %track.id, "web: failed to format annotate uri");
                (StatusCode::OK, String::new())
            }
        },
        Ok(None) => (StatusCode::OK, String::new()),
        Err(e) => {
            error!(error = %e, "web: scheduler failed to pick a track");
            (StatusCode::OK, String::new())
        }
    }
}

/// §6: always `200` — an unknown track id is a benign no-op, not a client error.
pub async fn track_started(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> StatusCode {
    match state.database.append_play_event(&track_id).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            error!(error = %e, track_id, "web: failed to append play event");
            StatusCode::OK
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Result<Json<LibraryStatus>, StatusCode> {
    let (pending, processing, ready, failed) =
        state.database.library_status_counts().await.map_err(|e| {
            error!(error = %e, "web: failed to load library status counts");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let programming_mode = state.database.programming_mode().await.map_err(|e| {
        error!(error = %e, "web: failed to load programming mode");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(LibraryStatus {
        pending,
        processing,
        ready,
        failed,
        programming_mode: programming_mode.as_str().to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListTracksQuery {
    pub limit: Option<i64>,
}

/// The worker's current job, if any — what it's doing right now, not history.
pub async fn worker_progress(State(state): State<AppState>) -> Json<Option<WorkerProgress>> {
    Json(state.worker_progress.read().await.clone())
}

pub async fn list_tracks(
    State(state): State<AppState>,
    axum::extract::Query(query): axum::extract::Query<ListTracksQuery>,
) -> Result<Json<Vec<Track>>, StatusCode> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    state
        .database
        .list_tracks_recent(limit)
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "web: failed to list recent tracks");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// §6: distinct submitter names with their total track counts.
pub async fn submitters(State(state): State<AppState>) -> Result<Json<Vec<SubmitterSummary>>, StatusCode> {
    state.database.submitter_summaries().await.map(Json).map_err(|e| {
        error!(error = %e, "web: failed to load submitter summaries");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// §6: single track detail, `404` if the id is unknown.
pub async fn get_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> Result<Json<Track>, StatusCode> {
    let track = state.database.get_track(&track_id).await.map_err(|e| {
        error!(error = %e, track_id, "web: failed to look up track");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    track.map(Json).ok_or(StatusCode::NOT_FOUND)
}
