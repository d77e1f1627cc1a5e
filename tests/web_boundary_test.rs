//! Black-box HTTP boundary tests: submission through to `next-track` and
//! `track-started`, plus the admin-token gate, driven directly against the
//! production router via `tower::ServiceExt::oneshot` rather than a bound
//! socket.

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use family_radio::config::Config;
use family_radio::scheduler::SchedulerService;
use family_radio::web::{AppState, WebServer};
use family_radio::worker::IngestionWorker;

use common::{seed_ready_track, test_db, zero_features};

fn test_config() -> Config {
    let mut config = Config::default();
    config.admin.token = Some("s3cret".to_string());
    config
}

async fn router_with_state(
    state_config: Config,
) -> (Router, family_radio::database::Database, tempfile::TempPath) {
    let (db, guard) = test_db().await;
    let worker = IngestionWorker::new(db.clone(), state_config.clone());
    let state = AppState {
        database: db.clone(),
        config: state_config,
        scheduler: SchedulerService::new(db.clone()),
        worker_progress: worker.progress_handle(),
    };
    (WebServer::create_router(state), db, guard)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    let request = if let Some(body) = body {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        builder.body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

#[tokio::test]
async fn next_track_is_empty_on_an_empty_library() {
    let (app, _db, _guard) = router_with_state(test_config()).await;
    let (status, body) = send(&app, Method::GET, "/next-track", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "");
}

#[tokio::test]
async fn submit_youtube_rejects_an_unrecognized_url() {
    let (app, _db, _guard) = router_with_state(test_config()).await;
    let payload = json!({
        "title": "Some Song",
        "artist": "Some Artist",
        "submitter": "alice",
        "url": "https://vimeo.com/12345",
    });
    let (status, _) = send(&app, Method::POST, "/submit/youtube", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submit_youtube_then_status_reflects_the_pending_track() {
    let (app, _db, _guard) = router_with_state(test_config()).await;
    let payload = json!({
        "title": "Some Song",
        "artist": "Some Artist",
        "submitter": "alice",
        "url": "https://youtu.be/dQw4w9WgXcQ",
    });
    let (status, body) = send(&app, Method::POST, "/submit/youtube", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    let submitted: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(submitted["status"], "pending");
    assert!(submitted["track_id"].as_str().is_some());

    let (status, body) = send(&app, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    let status_json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(status_json["pending"], 1);
    assert_eq!(status_json["ready"], 0);
}

#[tokio::test]
async fn submit_youtube_enforces_the_per_submitter_pending_cap() {
    let (app, _db, _guard) = router_with_state(test_config()).await;
    for _ in 0..5 {
        let payload = json!({
            "title": "Some Song",
            "artist": "Some Artist",
            "submitter": "alice",
            "url": "https://youtu.be/dQw4w9WgXcQ",
        });
        let (status, _) = send(&app, Method::POST, "/submit/youtube", Some(payload)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let sixth = json!({
        "title": "One Too Many",
        "artist": "Some Artist",
        "submitter": "alice",
        "url": "https://youtu.be/dQw4w9WgXcQ",
    });
    let (status, _) = send(&app, Method::POST, "/submit/youtube", Some(sixth)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn next_track_and_track_started_round_trip_through_the_play_log() {
    let (app, db, _guard) = router_with_state(test_config()).await;
    let track_id = seed_ready_track(&db, "alice", "Ready Song", 180.0, zero_features()).await;

    let (status, body) = send(&app, Method::GET, "/next-track", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.starts_with("annotate:title=\"Ready Song\""));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/track-started/{track_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // An unknown track id is a benign no-op, never an error, per the boundary contract.
    let (status, _) = send(&app, Method::POST, "/track-started/does-not-exist", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_reject_missing_or_wrong_token() {
    let (app, _db, _guard) = router_with_state(test_config()).await;

    let (status, _) = send(&app, Method::GET, "/admin/config/programming_mode", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/admin/config/programming_mode")
        .header("x-admin-token", "wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_accept_the_configured_token() {
    let (app, _db, _guard) = router_with_state(test_config()).await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/admin/config/programming_mode")
        .header("x-admin-token", "s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["value"], "rotation");
}
