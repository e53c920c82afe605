mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_app;
use common::http::{call, expect_error, read_json, send};

#[tokio::test]
async fn it_health_live_and_ready() {
    let app = spawn_test_app().await;

    let live = send(&app.app, Method::GET, "/health/live", None, &[]).await;
    assert_eq!(live.status(), StatusCode::OK);

    let ready = send(&app.app, Method::GET, "/health/ready", None, &[]).await;
    assert_eq!(ready.status(), StatusCode::OK);
}

#[tokio::test]
async fn it_health_reports_schema_version() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app.app, Method::GET, "/health/database", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["schemaVersion"], 2);

    let (status, body) = call(&app.app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn it_unknown_route_is_json_404_with_trace_id() {
    let app = spawn_test_app().await;

    let resp = send(
        &app.app,
        Method::GET,
        "/api/nowhere",
        None,
        &[("x-request-id", "trace-abc".to_string())],
    )
    .await;
    let (status, headers, body) = read_json(resp).await;
    assert_eq!(headers["x-request-id"], "trace-abc");
    expect_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");
    assert_eq!(body["traceId"], "trace-abc");
}
