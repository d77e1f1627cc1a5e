//! The streaming boundary contract (§6 External Interfaces): formatting the
//! `annotate:` URI the stream server polls for, and issuing the raw-socket
//! skip command against its control port.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::config::StreamingControlConfig;
use crate::database::Database;
use crate::models::Track;

const SKIP_COMMAND: &str = "dynamic.flush_and_skip\nquit\n";
const SKIP_RESPONSE_CAP: usize = 1024;

/// Escape `\` and `"` for the `annotate:title="...",artist="...":path` URI
/// format. No other character is rewritten.
fn escape_annotate_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

/// Build the plain-text body `GET /next-track` returns for a picked track.
/// Callers are responsible for falling back to an empty body when the
/// scheduler returns `None` — this never itself returns an empty string.
pub fn format_annotate_uri(track: &Track) -> Result<String> {
    let path = track
        .file_path
        .as_deref()
        .context("track has no file_path; it is not ready")?;

    Ok(format!(
        "annotate:title=\"{}\",artist=\"{}\":{}",
        escape_annotate_value(&track.title),
        escape_annotate_value(&track.artist),
        path
    ))
}

/// §6 Admin skip: clear `last_returned_track_id` so the next `/next-track`
/// poll re-runs the scheduling policy from scratch, then tell the stream
/// server to flush its current dynamic source and move on.
pub async fn skip(database: &Database, control: &StreamingControlConfig) -> Result<()> {
    database.set_last_returned_track_id(None).await?;
    send_skip_command(control).await
}

async fn send_skip_command(control: &StreamingControlConfig) -> Result<()> {
    let addr = format!("{}:{}", control.host, control.port);
    let timeout = Duration::from_secs(control.timeout_secs);

    let mut stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .context("timed out connecting to streaming control port")?
        .context("failed to connect to streaming control port")?;

    tokio::time::timeout(timeout, stream.write_all(SKIP_COMMAND.as_bytes()))
        .await
        .context("timed out sending skip command")?
        .context("failed to send skip command")?;

    let mut response = vec![0u8; SKIP_RESPONSE_CAP];
    match tokio::time::timeout(timeout, stream.read(&mut response)).await {
        Ok(Ok(n)) => {
            debug!(bytes = n, "streaming: skip command acknowledged");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "streaming: error reading skip response");
        }
        Err(_) => {
            // The control socket may close the connection without replying;
            // the command was already written, so this is not a failure.
            debug!("streaming: no response within timeout after skip command");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SourceType, TrackStatus};
    use chrono::Utc;

    fn sample_track(title: &str, artist: &str, file_path: &str) -> Track {
        Track {
            id: "track-1".to_string(),
            title: title.to_string(),
            artist: artist.to_string(),
            submitter: "alice".to_string(),
            source_type: SourceType::Upload,
            source_url: None,
            video_id: None,
            file_path: Some(file_path.to_string()),
            duration_s: Some(180.0),
            features: None,
            status: TrackStatus::Ready,
            error_msg: None,
            submitted_at: Utc::now(),
            ready_at: Some(Utc::now()),
            comment: None,
        }
    }

    #[test]
    fn escapes_backslash_and_quote_only() {
        assert_eq!(escape_annotate_value(r#"5"/6\"#), r#"5\"/6\\"#);
        assert_eq!(escape_annotate_value("plain"), "plain");
    }

    #[test]
    fn formats_annotate_uri() {
        let track = sample_track("Song \"One\"", "Artist", "/media/normalized/track-1.mp3");
        let uri = format_annotate_uri(&track).unwrap();
        assert_eq!(
            uri,
            r#"annotate:title="Song \"One\"",artist="Artist":/media/normalized/track-1.mp3"#
        );
    }

    #[test]
    fn rejects_track_without_file_path() {
        let mut track = sample_track("Song", "Artist", "unused");
        track.file_path = None;
        assert!(format_annotate_uri(&track).is_err());
    }
}
