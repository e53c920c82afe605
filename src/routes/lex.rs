use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::StudentPrincipal;
use crate::extractors::JsonBody;
use crate::lex::engine::SubmittedAnswer;
use crate::lex::selector::PoolOutcome;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::store::operations::questions::{Difficulty, Question};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(generate_session))
        .route("/sessions/complete", post(complete_session))
        .route("/next", post(next_question))
}

/// A question as shown to a student: no answer key, no worked solution.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub topic: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub grade_rating: u8,
    pub hint: Option<String>,
}

impl From<Question> for QuestionView {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            text: q.text,
            options: q.options,
            topic: q.topic,
            subject: q.subject,
            difficulty: q.difficulty,
            grade_rating: q.grade_rating,
            hint: q.hint,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    session_id: String,
    questions: Vec<QuestionView>,
    pools: Vec<PoolOutcome>,
}

async fn generate_session(
    principal: StudentPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.engine().generate_session(&principal.student_id).await?;
    Ok(ok(SessionView {
        session_id: session.session_id,
        questions: session.questions.into_iter().map(QuestionView::from).collect(),
        pools: session.pools,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteSessionRequest {
    session_id: String,
    answers: Vec<SubmittedAnswer>,
}

async fn complete_session(
    principal: StudentPrincipal,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CompleteSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if req.answers.is_empty() {
        return Err(AppError::bad_request("EMPTY_SESSION", "answers must not be empty"));
    }
    let result = state
        .engine()
        .complete_session(&principal.student_id, &req.session_id, req.answers)
        .await?;
    Ok(ok(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextQuestionRequest {
    current_question_id: String,
    was_correct: bool,
}

async fn next_question(
    _principal: StudentPrincipal,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<NextQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let next = state
        .engine()
        .next_question(&req.current_question_id, req.was_correct)
        .await?;
    Ok(ok(next.map(QuestionView::from)))
}
