mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use vgen_api::shutdown::drain_on_signal;
use vgen_api::InsertListener;
use vgen_models::{JobId, JobRecord};

use common::{TestApp, TEMPLATE, UNREACHABLE};

fn record(id: &str, template: &str) -> JobRecord {
    JobRecord::new(id).with_template(template)
}

#[tokio::test]
async fn test_run_without_input_is_bad_request() {
    let app = TestApp::new();

    let (status, body) = app.post("/run", r#"{"id": "job-1"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "No input provided in the job", "details": "No input provided in the job"})
    );
}

#[tokio::test]
async fn test_run_null_input_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.post("/run", r#"{"input": null}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No input provided in the job");
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app.post("/render", r#"{"id": "nope"}"#).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Record not found");
    assert!(body["details"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_render_by_id_completes() {
    let app = TestApp::new();
    app.store.insert("videos", record("job-1", TEMPLATE));

    let (status, body) = app.post("/render", r#"{"id": "job-1"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "job-1");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["video_url"], "https://cdn.test/renders/job-1.mp4");
    assert_eq!(
        app.store.statuses_for(&JobId::from("job-1")),
        vec!["processing", "completed"]
    );
}

#[tokio::test]
async fn test_run_envelope_with_notification_skips_fetch() {
    let app = TestApp::new();
    let payload = json!({
        "input": {
            "type": "INSERT",
            "record": {"id": 77, "remotion": {"template": TEMPLATE}}
        }
    });

    let (status, body) = app.post("/run", &payload.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "77");
    assert_eq!(body["status"], "completed");
}

#[tokio::test]
async fn test_unsupported_notification_type_is_bad_request() {
    let app = TestApp::new();
    let payload = json!({"type": "DELETE", "record": {"id": "1", "remotion": {"template": TEMPLATE}}});

    let (status, _) = app.post("/render", &payload.to_string()).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.statuses_for(&JobId::from("1")).is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_bad_request() {
    let app = TestApp::new();
    let (status, body) = app.post("/render", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = app.post("/render", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Payload needs an id or a record");
}

#[tokio::test]
async fn test_unreachable_media_rejected_without_status() {
    let app = TestApp::new();
    app.store.insert("videos", record("job-2", UNREACHABLE));

    let (status, body) = app.post("/render", r#"{"id": "job-2"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid job");
    assert!(app.store.statuses_for(&JobId::from("job-2")).is_empty());
    assert_eq!(app.state.scheduler.status().queued, 0);
}

#[tokio::test]
async fn test_render_failure_is_internal_error_with_failed_status() {
    let app = TestApp::failing_renderer();
    app.store.insert("videos", record("job-3", TEMPLATE));

    let (status, body) = app.post("/render", r#"{"id": "job-3"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Render job failed");
    assert!(body["details"].as_str().unwrap().contains("compositor crashed"));
    assert_eq!(
        app.store.statuses_for(&JobId::from("job-3")),
        vec!["processing", "failed"]
    );
}

#[tokio::test]
async fn test_stopped_scheduler_is_unavailable() {
    let app = TestApp::new();
    app.store.insert("videos", record("job-4", TEMPLATE));
    assert!(app.state.scheduler.stop(Duration::from_secs(1)).await);

    let (status, body) = app.post("/render", r#"{"id": "job-4"}"#).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service unavailable");
}

#[tokio::test]
async fn test_status_and_health() {
    let app = TestApp::new();

    let (status, body) = app.get("/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"queued": 0, "running": 0, "limit": 2}));

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["accepting"], true);
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = TestApp::new();
    let (status, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_insert_listener_renders_new_records() {
    let app = TestApp::new();
    let listener = InsertListener::new(app.store.clone(), app.state.scheduler.clone(), "videos");
    tokio::spawn(listener.run());
    // Let the listener subscribe before inserting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    app.store.insert("videos", record("job-5", TEMPLATE));
    app.store.insert("other", record("job-6", TEMPLATE));

    let id = JobId::from("job-5");
    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if app.store.statuses_for(&id).last().map(String::as_str) == Some("completed") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(completed.is_ok());
    assert!(app.store.statuses_for(&JobId::from("job-6")).is_empty());
}

#[tokio::test]
async fn test_duplicate_render_is_conflict() {
    let app = Arc::new(TestApp::gated_renderer(2));
    app.store.insert("videos", record("job-7", TEMPLATE));

    let first = {
        let app = app.clone();
        tokio::spawn(async move { app.post("/render", r#"{"id": "job-7"}"#).await })
    };
    app.wait_for_queue(1, 0).await;

    let (status, body) = app.post("/render", r#"{"id": "job-7"}"#).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Job already in progress");

    app.gate.as_ref().unwrap().add_permits(1);
    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_shutdown_releases_queued_requests() {
    let app = Arc::new(TestApp::gated_renderer(1));
    app.store.insert("videos", record("job-8", TEMPLATE));
    app.store.insert("videos", record("job-9", TEMPLATE));

    let running = {
        let app = app.clone();
        tokio::spawn(async move { app.post("/render", r#"{"id": "job-8"}"#).await })
    };
    app.wait_for_queue(1, 0).await;
    let queued = {
        let app = app.clone();
        tokio::spawn(async move { app.post("/render", r#"{"id": "job-9"}"#).await })
    };
    app.wait_for_queue(1, 1).await;

    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = tokio::spawn(drain_on_signal(
        async move {
            let _ = signal_rx.await;
        },
        app.state.scheduler.clone(),
        Duration::from_secs(5),
    ));
    signal_tx.send(()).unwrap();

    // The queued request answers while the running job is still blocked.
    let (status, body) = tokio::time::timeout(Duration::from_secs(2), queued)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Service unavailable");
    assert!(app.store.statuses_for(&JobId::from("job-9")).is_empty());

    app.gate.as_ref().unwrap().add_permits(1);
    let (status, _) = running.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(shutdown.await.unwrap());

    let (status, _) = app.post("/render", r#"{"id": "job-8"}"#).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
