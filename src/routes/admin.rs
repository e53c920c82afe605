use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AdminPrincipal;
use crate::extractors::JsonBody;
use crate::lex::engine::{NewHomework, NewLesson};
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::questions::{Difficulty, Question};
use crate::store::operations::xp_events::XpAction;

const MAX_QUESTIONS_PER_BATCH: usize = 1000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", put(upsert_questions))
        .route("/students", post(create_student))
        .route("/lessons", post(create_lesson))
        .route("/homework", post(create_homework))
        .route("/xp", post(grant_xp))
        .route("/badges/:badge_id/award/:student_id", post(award_badge))
        .route("/maintenance/daily", post(run_daily))
        .route("/maintenance/weekly", post(run_weekly))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionPayload {
    id: String,
    text: String,
    #[serde(default)]
    options: Vec<String>,
    correct_answer: String,
    topic: String,
    subject: String,
    difficulty: Difficulty,
    grade_rating: u8,
    explanation: Option<String>,
    hint: Option<String>,
    video_solution_url: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl QuestionPayload {
    fn into_question(self, now: DateTime<Utc>) -> Question {
        Question {
            id: self.id,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer,
            topic: self.topic,
            subject: self.subject,
            difficulty: self.difficulty,
            grade_rating: self.grade_rating,
            explanation: self.explanation,
            hint: self.hint,
            video_solution_url: self.video_solution_url,
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertSummary {
    upserted: usize,
}

async fn upsert_questions(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<Vec<QuestionPayload>>,
) -> Result<impl IntoResponse, AppError> {
    if payload.len() > MAX_QUESTIONS_PER_BATCH {
        return Err(AppError::bad_request(
            "BATCH_TOO_LARGE",
            &format!("at most {MAX_QUESTIONS_PER_BATCH} questions per request"),
        ));
    }
    let now = Utc::now();
    let questions = payload.into_iter().map(|p| p.into_question(now)).collect();
    let upserted = state.engine().upsert_questions(questions).await?;
    tracing::info!(admin_id = %admin.admin_id, upserted, "Question bank updated");
    Ok(ok(UpsertSummary { upserted }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateStudentRequest {
    id: String,
    display_name: String,
    parent_id: Option<String>,
}

async fn create_student(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateStudentRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.id.trim().is_empty() || req.display_name.trim().is_empty() {
        return Err(AppError::bad_request(
            "INVALID_STUDENT",
            "id and displayName must not be empty",
        ));
    }
    let profile = state
        .engine()
        .create_student(req.id.trim(), req.display_name.trim(), req.parent_id)
        .await?;
    Ok(created(profile))
}

async fn create_lesson(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NewLesson>,
) -> Result<impl IntoResponse, AppError> {
    if req.id.trim().is_empty() || req.title.trim().is_empty() || req.subject.trim().is_empty() {
        return Err(AppError::bad_request(
            "INVALID_LESSON",
            "id, title and subject must not be empty",
        ));
    }
    let lesson = NewLesson {
        id: req.id.trim().to_string(),
        title: req.title.trim().to_string(),
        subject: req.subject.trim().to_string(),
    };
    Ok(created(state.engine().create_lesson(lesson).await?))
}

async fn create_homework(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NewHomework>,
) -> Result<impl IntoResponse, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::bad_request("INVALID_HOMEWORK", "title must not be empty"));
    }
    Ok(created(state.engine().create_homework(req).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantXpRequest {
    student_id: String,
    action: XpAction,
    amount: u64,
    trigger: String,
}

async fn grant_xp(
    admin: AdminPrincipal,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<GrantXpRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.amount == 0 {
        return Err(AppError::bad_request("INVALID_AMOUNT", "amount must be positive"));
    }
    let balance = state
        .engine()
        .grant_xp(&req.student_id, req.action, req.amount, &req.trigger)
        .await?;
    tracing::info!(
        admin_id = %admin.admin_id,
        student_id = %req.student_id,
        amount = req.amount,
        "Manual XP grant"
    );
    Ok(ok(balance))
}

async fn award_badge(
    _admin: AdminPrincipal,
    Path((badge_id, student_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let award = state.engine().award_badge(&student_id, &badge_id).await?;
    Ok(created(award))
}

async fn run_daily(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().run_daily_maintenance().await?))
}

async fn run_weekly(
    _admin: AdminPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().run_weekly_maintenance().await?))
}
