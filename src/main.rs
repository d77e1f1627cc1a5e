use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use family_radio::config::Config;
use family_radio::database::Database;
use family_radio::scheduler::SchedulerService;
use family_radio::web::{AppState, WebServer};
use family_radio::worker::IngestionWorker;

#[derive(Parser)]
#[command(name = "family-radio")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scheduler and ingestion backend for a personal internet radio station")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address (overrides config file)
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Database URL (overrides config file)
    #[arg(short = 'd', long, value_name = "URL")]
    database_url: Option<String>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("family_radio={},tower_http=trace", cli.log_level)
    } else {
        format!("family_radio={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting family-radio v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!(config_file = %cli.config, "configuration loaded");

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database.url = database_url;
    }

    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!(url = %config.database.url, "database connected and migrated");

    let scheduler = SchedulerService::new(database.clone());

    let worker = IngestionWorker::new(database.clone(), config.clone());
    let worker_progress = worker.progress_handle();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let shutdown_join_timeout = std::time::Duration::from_secs(config.worker.shutdown_join_timeout_secs);

    let web_server = WebServer::new(AppState {
        database,
        config,
        scheduler,
        worker_progress,
    })?;

    info!(host = %web_server.host(), port = web_server.port(), "starting web server");

    tokio::select! {
        result = web_server.serve() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(shutdown_join_timeout, worker_handle)
        .await
        .is_err()
    {
        tracing::warn!("worker did not shut down within the configured timeout");
    }

    Ok(())
}
