use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
    pub streaming_control: StreamingControlConfig,
    pub admin: AdminConfig,
    pub alerting: Option<AlertingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory raw uploads and downloader output are written into.
    pub raw_media_path: PathBuf,
    /// Directory normalized (post-transcode) tracks are written into.
    pub normalized_media_path: PathBuf,
    pub max_upload_bytes: u64,
    pub max_pending_per_submitter: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Wait before re-polling an empty job queue, in seconds.
    pub idle_poll_secs: u64,
    /// Back off this long after a failed job before polling again, in seconds.
    pub error_backoff_secs: u64,
    /// Wall-clock timeout for each external process invocation (downloader,
    /// transcoder, prober), in seconds.
    pub external_process_timeout_secs: u64,
    /// Bounded wait for an in-flight job to finish on shutdown, in seconds.
    pub shutdown_join_timeout_secs: u64,
    /// Path to the external downloader binary (e.g. yt-dlp).
    pub downloader_bin: String,
    /// Path to the external transcoder binary (e.g. ffmpeg).
    pub transcoder_bin: String,
    /// Path to the external prober binary (e.g. ffprobe).
    pub prober_bin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingControlConfig {
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: String,
    pub to_address: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./family-radio.db".to_string(),
                max_connections: Some(5),
            },
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            storage: StorageConfig {
                raw_media_path: PathBuf::from("./data/media/raw"),
                normalized_media_path: PathBuf::from("./data/media/normalized"),
                max_upload_bytes: 200 * 1024 * 1024,
                max_pending_per_submitter: 5,
            },
            worker: WorkerConfig {
                idle_poll_secs: 5,
                error_backoff_secs: 10,
                external_process_timeout_secs: 300,
                shutdown_join_timeout_secs: 30,
                downloader_bin: "yt-dlp".to_string(),
                transcoder_bin: "ffmpeg".to_string(),
                prober_bin: "ffprobe".to_string(),
            },
            streaming_control: StreamingControlConfig {
                host: "liquidsoap".to_string(),
                port: 1234,
                timeout_secs: 5,
            },
            admin: AdminConfig { token: None },
            alerting: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::create_dir_all(&default_config.storage.raw_media_path)?;
            std::fs::create_dir_all(&default_config.storage.normalized_media_path)?;
            std::fs::write(&config_file, contents)?;
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_worker_timings() {
        let config = Config::default();
        assert_eq!(config.worker.idle_poll_secs, 5);
        assert_eq!(config.worker.error_backoff_secs, 10);
        assert_eq!(config.worker.external_process_timeout_secs, 300);
        assert_eq!(config.worker.shutdown_join_timeout_secs, 30);
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.web.port, config.web.port);
        assert_eq!(parsed.streaming_control.port, config.streaming_control.port);
    }
}
