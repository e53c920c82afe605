use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::StudentPrincipal;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(earned))
        .route("/eligible", get(eligible))
}

async fn earned(
    principal: StudentPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().earned_badges(&principal.student_id).await?))
}

/// Badges the student qualifies for but does not hold yet. Nothing is awarded.
async fn eligible(
    principal: StudentPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.engine().eligible_badges(&principal.student_id).await?))
}
