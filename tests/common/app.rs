use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use axum::Router;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::broadcast;

use lex_backend::config::{Config, LexEnvConfig, WorkerConfig};
use lex_backend::lex::{LexConfig, LexEngine};
use lex_backend::routes::build_router;
use lex_backend::state::AppState;
use lex_backend::store::operations::questions::{Difficulty, Question};
use lex_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

/// Build the full router over a throwaway store. The config is constructed
/// directly so parallel tests never race on process environment.
pub async fn spawn_test_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("lex-test.sled");

    let config = Config {
        host: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        jwt_secret: format!("integration-test-secret-{}", uuid::Uuid::new_v4()),
        cors_origin: "http://localhost:5173".to_string(),
        seed_demo_data: false,
        worker: WorkerConfig {
            is_leader: false,
            daily_maintenance_cron: "0 0 1 * * *".to_string(),
            weekly_maintenance_cron: "0 30 6 * * 1".to_string(),
        },
        lex: LexEnvConfig {
            session_size: 20,
            time_bonus_secs: 30,
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let engine = Arc::new(LexEngine::new(LexConfig::from_env(&config.lex), store.clone()));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, engine, &config, shutdown_tx);

    TestApp {
        app: build_router(state.clone()),
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub fn question(id: &str, topic: &str, difficulty: Difficulty, rating: u8, answer: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}"),
        options: vec![answer.to_string(), "wrong".to_string()],
        correct_answer: answer.to_string(),
        topic: topic.to_string(),
        subject: "Mathematics".to_string(),
        difficulty,
        grade_rating: rating,
        explanation: Some(format!("Because {answer}")),
        hint: None,
        video_solution_url: None,
        created_at: Utc::now(),
    }
}
