use axum::http::Method;
use axum::Router;

use lex_backend::auth::{sign_token, Role};

use super::http::{call, expect_ok};

pub fn admin_token(secret: &str) -> String {
    sign_token("admin-1", Role::Admin, secret, 1).expect("sign admin token")
}

pub fn student_token(secret: &str, student_id: &str) -> String {
    sign_token(student_id, Role::Student, secret, 1).expect("sign student token")
}

/// Create a student through the admin API and return a token for them.
pub async fn create_student(app: &Router, secret: &str, student_id: &str) -> String {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/admin/students",
        Some(serde_json::json!({ "id": student_id, "displayName": "Test Student" })),
        Some(&admin_token(secret)),
    )
    .await;
    expect_ok(status, &body);
    student_token(secret, student_id)
}

/// Register a lesson in the catalog through the admin API.
pub async fn create_lesson(app: &Router, secret: &str, lesson_id: &str, subject: &str) {
    let (status, body) = call(
        app,
        Method::POST,
        "/api/admin/lessons",
        Some(serde_json::json!({ "id": lesson_id, "title": "Test lesson", "subject": subject })),
        Some(&admin_token(secret)),
    )
    .await;
    expect_ok(status, &body);
}
