use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::auth::StudentPrincipal;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(latest))
}

async fn latest(
    _principal: StudentPrincipal,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let board = state
        .engine()
        .latest_leaderboard()
        .await?
        .ok_or_else(|| AppError::not_found("No leaderboard has been published yet"))?;
    Ok(ok(board))
}
