use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

/// Drive one request through the router with arbitrary headers.
pub async fn send(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    headers: &[(&str, String)],
) -> Response {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, value.as_str());
    }
    let req = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");
    app.clone().oneshot(req).await.expect("router response")
}

pub async fn read_json(resp: Response) -> (StatusCode, HeaderMap, Value) {
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, headers, json)
}

/// Send as the bearer of `token` (or anonymously) and decode the JSON reply.
pub async fn call(
    app: &Router,
    method: Method,
    path: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let headers: Vec<(&str, String)> = token
        .map(|t| vec![("authorization", format!("Bearer {t}"))])
        .unwrap_or_default();
    let (status, _, json) = read_json(send(app, method, path, body, &headers).await).await;
    (status, json)
}

/// Assert a success envelope and hand back its `data`.
pub fn expect_ok(status: StatusCode, body: &Value) -> &Value {
    assert!(status.is_success(), "unexpected status {status}: {body}");
    assert_eq!(body["success"], true);
    &body["data"]
}

pub fn expect_error(status: StatusCode, body: &Value, expected: StatusCode, code: &str) {
    assert_eq!(status, expected, "{body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], code);
    assert!(body["message"].is_string());
}
