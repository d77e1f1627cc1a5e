//! Operator email alerts for ingestion failures that look like an external
//! block rather than an ordinary transient error (§7 Error Handling).
//!
//! Only one signal is recognized today: the bot-check message a downloader
//! emits when the remote site demands interactive verification. Alerting is
//! entirely optional — when [`AlertingConfig`] is absent, [`maybe_alert`] is
//! a no-op, since a personal station without SMTP configured should not fail
//! ingestion over a missing mailer.

use anyhow::{Context, Result};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::AlertingConfig;

/// Substrings that mark a failure as worth paging a human about, rather than
/// an ordinary transient fetch/transcode error the worker will naturally
/// retry-surface as a `failed` track.
const ALERT_SIGNALS: &[&str] = &[
    "Sign in to confirm you're not a bot",
    "confirm you're not a bot",
];

pub async fn maybe_alert(
    config: Option<&AlertingConfig>,
    track_id: &str,
    submitter: &str,
    error_message: &str,
) -> Result<()> {
    let Some(config) = config else {
        return Ok(());
    };

    if !ALERT_SIGNALS.iter().any(|s| error_message.contains(s)) {
        return Ok(());
    }

    send_alert(config, track_id, submitter, error_message).await
}

async fn send_alert(
    config: &AlertingConfig,
    track_id: &str,
    submitter: &str,
    error_message: &str,
) -> Result<()> {
    let from: Mailbox = config
        .from_address
        .parse()
        .context("invalid alerting.from_address")?;
    let to: Mailbox = config
        .to_address
        .parse()
        .context("invalid alerting.to_address")?;

    let body = format!(
        "Ingestion for track {track_id} (submitted by {submitter}) failed in a way that \
         looks like an external block rather than a transient error:\n\n{error_message}"
    );

    let email = Message::builder()
        .from(from)
        .to(to)
        .subject(format!("family-radio: ingestion blocked for track {track_id}"))
        .body(body)
        .context("failed to build alert email")?;

    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        .context("failed to configure SMTP relay")?
        .port(config.smtp_port);

    if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    let mailer = builder.build();

    mailer
        .send(email)
        .await
        .context("failed to send alert email")?;

    info!(track_id, "alerting: sent ingestion-blocked email");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_op_without_config() {
        let result = maybe_alert(None, "track-1", "alice", "Sign in to confirm you're not a bot").await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn no_op_for_unrecognized_error() {
        let config = AlertingConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            from_address: "radio@example.com".to_string(),
            to_address: "ops@example.com".to_string(),
        };
        // An ordinary network error never attempts to contact the SMTP host.
        let result = maybe_alert(Some(&config), "track-1", "alice", "connection reset by peer").await;
        assert!(result.is_ok());
    }
}
