mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::app::{question, spawn_test_app, TestApp};
use common::auth::{admin_token, create_lesson, create_student, student_token};
use common::http::{call, expect_error, expect_ok};
use lex_backend::store::operations::questions::Difficulty;

async fn seed_bank(app: &TestApp) {
    let questions = vec![
        question("f1", "Fractions", Difficulty::Easy, 20, "3/4"),
        question("f2", "Fractions", Difficulty::Medium, 40, "18"),
        question("f3", "Fractions", Difficulty::Hard, 70, "1/12"),
        question("a1", "Algebra", Difficulty::Easy, 25, "4"),
        question("a2", "Algebra", Difficulty::Hard, 80, "-6"),
    ];
    let (status, body) = call(
        &app.app,
        Method::PUT,
        "/api/admin/questions",
        Some(serde_json::to_value(&questions).unwrap()),
        Some(&admin_token(&app.config.jwt_secret)),
    )
    .await;
    assert_eq!(expect_ok(status, &body)["upserted"], 5);
}

/// Start a session and return its id.
async fn start_session(app: &TestApp, token: &str) -> String {
    let (status, body) = call(&app.app, Method::POST, "/api/lex/sessions", None, Some(token)).await;
    expect_ok(status, &body)["sessionId"]
        .as_str()
        .expect("session id")
        .to_string()
}

async fn submit(app: &TestApp, token: &str, session_id: &str, answers: Value) -> (StatusCode, Value) {
    call(
        &app.app,
        Method::POST,
        "/api/lex/sessions/complete",
        Some(json!({ "sessionId": session_id, "answers": answers })),
        Some(token),
    )
    .await
}

#[tokio::test]
async fn it_session_hides_answers_and_grades_completion() {
    let app = spawn_test_app().await;
    seed_bank(&app).await;
    let token = create_student(&app.app, &app.config.jwt_secret, "s1").await;

    let (status, body) = call(&app.app, Method::POST, "/api/lex/sessions", None, Some(&token)).await;
    let session = expect_ok(status, &body);
    let questions = session["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 5);
    assert!(questions.iter().all(|q| q.get("correctAnswer").is_none()));
    assert!(session["pools"].as_array().is_some());
    let session_id = session["sessionId"].as_str().unwrap().to_string();

    let (status, body) = submit(
        &app,
        &token,
        &session_id,
        json!([
            { "questionId": "f1", "answer": " 3/4 ", "timeTaken": 10 },
            { "questionId": "a2", "answer": "6", "timeTaken": 50 },
        ]),
    )
    .await;
    let data = expect_ok(status, &body);
    assert_eq!(data["sessionId"], session_id.as_str());
    assert_eq!(data["correct"], 1);
    assert_eq!(data["total"], 2);
    // easy answered within the time bonus: floor(10 * 1.2)
    assert_eq!(data["xpAwarded"], 12);
    assert_eq!(data["currentWorkingAverage"], 50.0);
    assert_eq!(data["answers"][1]["correctAnswer"], "-6");

    let (status, body) = call(&app.app, Method::GET, "/api/progress", None, Some(&token)).await;
    let progress = expect_ok(status, &body);
    assert_eq!(progress["profile"]["xpTotal"], 12);
    assert_eq!(progress["profile"]["currentLevel"], 1);
    assert_eq!(progress["xpForNextLevel"], 188);
    assert!(progress["profile"]["lastLogin"].is_string());

    let (_, body) = call(
        &app.app,
        Method::GET,
        "/api/progress/topics/Fractions",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(body["data"]["attempts"], 1);
    assert_eq!(body["data"]["mastery"], 100.0);
}

#[tokio::test]
async fn it_session_can_only_be_completed_once() {
    let app = spawn_test_app().await;
    seed_bank(&app).await;
    let token = create_student(&app.app, &app.config.jwt_secret, "s1").await;
    let session_id = start_session(&app, &token).await;
    let answers = json!([{ "questionId": "f1", "answer": "3/4", "timeTaken": 5 }]);

    let (status, body) = submit(&app, &token, &session_id, answers.clone()).await;
    assert_eq!(expect_ok(status, &body)["xpAwarded"], 12);

    let (status, body) = submit(&app, &token, &session_id, answers).await;
    expect_error(status, &body, StatusCode::CONFLICT, "SESSION_CONFLICT");

    let (_, body) = call(&app.app, Method::GET, "/api/progress", None, Some(&token)).await;
    assert_eq!(body["data"]["profile"]["xpTotal"], 12);
}

#[tokio::test]
async fn it_repeated_question_in_submission_is_rejected() {
    let app = spawn_test_app().await;
    seed_bank(&app).await;
    let token = create_student(&app.app, &app.config.jwt_secret, "s1").await;
    let session_id = start_session(&app, &token).await;

    let repeated: Vec<Value> = (0..5)
        .map(|_| json!({ "questionId": "f1", "answer": "3/4", "timeTaken": 1 }))
        .collect();
    let (status, body) = submit(&app, &token, &session_id, Value::Array(repeated)).await;
    expect_error(status, &body, StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE");

    let (_, body) = call(&app.app, Method::GET, "/api/progress", None, Some(&token)).await;
    assert_eq!(body["data"]["profile"]["xpTotal"], 0);
}

#[tokio::test]
async fn it_answers_outside_the_session_write_nothing() {
    let app = spawn_test_app().await;
    seed_bank(&app).await;
    let token = create_student(&app.app, &app.config.jwt_secret, "s2").await;
    let session_id = start_session(&app, &token).await;

    let (status, body) = submit(
        &app,
        &token,
        &session_id,
        json!([
            { "questionId": "f1", "answer": "3/4", "timeTaken": 10 },
            { "questionId": "missing", "answer": "x", "timeTaken": 10 },
        ]),
    )
    .await;
    expect_error(status, &body, StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE");

    let (_, body) = call(
        &app.app,
        Method::GET,
        "/api/progress/topics/Fractions",
        None,
        Some(&token),
    )
    .await;
    assert_eq!(body["data"]["attempts"], 0);

    let answers = json!([{ "questionId": "f1", "answer": "3/4", "timeTaken": 10 }]);
    let (status, body) = submit(&app, &token, "never-issued", answers).await;
    expect_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[tokio::test]
async fn it_empty_answers_are_rejected() {
    let app = spawn_test_app().await;
    let token = create_student(&app.app, &app.config.jwt_secret, "s3").await;

    let (status, body) = submit(&app, &token, "any", json!([])).await;
    expect_error(status, &body, StatusCode::BAD_REQUEST, "EMPTY_SESSION");
}

#[tokio::test]
async fn it_next_question_steps_up_after_correct() {
    let app = spawn_test_app().await;
    seed_bank(&app).await;
    let token = create_student(&app.app, &app.config.jwt_secret, "s4").await;

    let (status, body) = call(
        &app.app,
        Method::POST,
        "/api/lex/next",
        Some(json!({ "currentQuestionId": "f1", "wasCorrect": true })),
        Some(&token),
    )
    .await;
    let next = expect_ok(status, &body);
    assert_eq!(next["topic"], "Fractions");
    assert!(next["gradeRating"].as_u64().unwrap() > 20);

    let (_, body) = call(
        &app.app,
        Method::POST,
        "/api/lex/next",
        Some(json!({ "currentQuestionId": "a1", "wasCorrect": false })),
        Some(&token),
    )
    .await;
    // only the harder algebra question is left
    assert_eq!(body["data"]["id"], "a2");
}

#[tokio::test]
async fn it_rejects_missing_and_wrong_role_tokens() {
    let app = spawn_test_app().await;

    let (status, body) = call(&app.app, Method::GET, "/api/progress", None, None).await;
    expect_error(status, &body, StatusCode::UNAUTHORIZED, "AUTH_UNAUTHORIZED");

    let admin = admin_token(&app.config.jwt_secret);
    let (status, _) = call(&app.app, Method::GET, "/api/progress", None, Some(&admin)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let ghost = student_token(&app.config.jwt_secret, "ghost");
    let (status, _) = call(&app.app, Method::GET, "/api/progress", None, Some(&ghost)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn it_lesson_and_homework_flow() {
    let app = spawn_test_app().await;
    let secret = app.config.jwt_secret.clone();
    let token = create_student(&app.app, &secret, "s5").await;
    let admin = admin_token(&secret);
    create_lesson(&app.app, &secret, "l1", "Mathematics").await;

    for expected in [true, false] {
        let (status, body) =
            call(&app.app, Method::POST, "/api/lessons/l1/complete", None, Some(&token)).await;
        assert_eq!(expect_ok(status, &body)["newlyCompleted"], expected);
    }

    let (status, body) =
        call(&app.app, Method::POST, "/api/lessons/made-up/complete", None, Some(&token)).await;
    expect_error(status, &body, StatusCode::NOT_FOUND, "NOT_FOUND");

    let due = (chrono::Utc::now() + chrono::Duration::days(3)).to_rfc3339();
    let (status, _) = call(
        &app.app,
        Method::POST,
        "/api/admin/homework",
        Some(json!({
            "id": "hw1",
            "studentId": "s5",
            "title": "Fractions sheet",
            "subject": "Mathematics",
            "dueDate": due,
        })),
        Some(&admin),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = call(&app.app, Method::GET, "/api/homework", None, Some(&token)).await;
    assert_eq!(body["data"][0]["completionStatus"], "not_started");

    // completing requires starting first
    let (status, body) =
        call(&app.app, Method::POST, "/api/homework/hw1/complete", None, Some(&token)).await;
    expect_error(status, &body, StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE");

    let (_, body) = call(&app.app, Method::POST, "/api/homework/hw1/start", None, Some(&token)).await;
    assert_eq!(body["data"]["completionStatus"], "in_progress");

    let (status, body) =
        call(&app.app, Method::POST, "/api/homework/hw1/complete", None, Some(&token)).await;
    // lesson 25 + homework 50
    assert_eq!(expect_ok(status, &body)["balance"]["xpTotal"], 75);

    let (status, body) =
        call(&app.app, Method::POST, "/api/homework/hw1/complete", None, Some(&token)).await;
    expect_error(status, &body, StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE");
}
