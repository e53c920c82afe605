use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;

use crate::auth::StudentPrincipal;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn lessons_router() -> Router<AppState> {
    Router::new().route("/:lesson_id/complete", post(complete_lesson))
}

pub fn homework_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_homework))
        .route("/:homework_id/start", post(start_homework))
        .route("/:homework_id/complete", post(complete_homework))
}

async fn complete_lesson(
    principal: StudentPrincipal,
    Path(lesson_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .engine()
        .complete_lesson(&principal.student_id, &lesson_id)
        .await?;
    Ok(ok(outcome))
}

async fn list_homework(
    principal: StudentPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().list_homework(&principal.student_id).await?))
}

async fn start_homework(
    principal: StudentPrincipal,
    Path(homework_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let assignment = state
        .engine()
        .start_homework(&principal.student_id, &homework_id)
        .await?;
    Ok(ok(assignment))
}

async fn complete_homework(
    principal: StudentPrincipal,
    Path(homework_id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .engine()
        .complete_homework(&principal.student_id, &homework_id)
        .await?;
    Ok(ok(outcome))
}
