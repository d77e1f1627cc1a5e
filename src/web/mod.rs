//! HTTP boundary layer: submission, the streaming contract, library status,
//! and admin operations (§6 External Interfaces).
//!
//! Handlers stay thin and delegate to the database/scheduler/worker layers,
//! mapping failures to status codes at the edge — the same shape the
//! teacher's `web::api` module uses (`Result<Json<T>, StatusCode>`, errors
//! logged once at the handler before being collapsed to a status code).

pub mod admin;
pub mod handlers;

use std::net::SocketAddr;

use anyhow::Result;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::database::Database;
use crate::scheduler::SchedulerService;
use crate::worker::ProgressHandle;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub config: Config,
    pub scheduler: SchedulerService,
    pub worker_progress: ProgressHandle,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        let app = Self::create_router(state);
        Ok(Self { app, addr })
    }

    /// Build the routed app without binding a socket — the HTTP boundary
    /// integration tests drive this directly via `tower::ServiceExt::oneshot`.
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/submit/upload", post(handlers::submit_upload))
            .route("/submit/youtube", post(handlers::submit_youtube))
            .route("/next-track", get(handlers::next_track))
            .route("/track-started/:track_id", post(handlers::track_started))
            .route("/status", get(handlers::status))
            .route("/worker/progress", get(handlers::worker_progress))
            .route("/tracks", get(handlers::list_tracks))
            .route("/track/:track_id", get(handlers::get_track))
            .route("/submitters", get(handlers::submitters))
            .route(
                "/admin/config/:key",
                get(admin::get_config).put(admin::set_config),
            )
            .route("/admin/tracks/:track_id", delete(admin::delete_track))
            .route("/admin/skip", post(admin::skip))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        tracing::info!(addr = %self.addr, "web: listening");
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
