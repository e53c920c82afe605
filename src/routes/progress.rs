use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::StudentPrincipal;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(progress))
        .route("/topics/:topic", get(topic_mastery))
}

async fn progress(
    principal: StudentPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().progress(&principal.student_id).await?))
}

async fn topic_mastery(
    principal: StudentPrincipal,
    Path(topic): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let mastery = state
        .engine()
        .topic_mastery(&principal.student_id, &topic)
        .await?;
    Ok(ok(mastery))
}
