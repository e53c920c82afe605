pub mod admin;
pub mod badges;
pub mod coursework;
pub mod health;
pub mod leaderboard;
pub mod lex;
pub mod progress;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::middleware::request_id;
use crate::state::AppState;

/// Maximum request body size: 2 MiB.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/lex", lex::router())
        .nest("/progress", progress::router())
        .nest("/lessons", coursework::lessons_router())
        .nest("/homework", coursework::homework_router())
        .nest("/badges", badges::router())
        .nest("/leaderboard", leaderboard::router())
        .nest("/admin", admin::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}
