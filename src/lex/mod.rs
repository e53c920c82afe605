//! The Lex adaptive practice engine: question selection, mastery, XP and
//! gamification over the repository ports.

pub mod badges;
pub mod bank;
pub mod config;
pub mod coursework;
pub mod engine;
pub mod error;
pub mod leaderboard;
pub mod maintenance;
pub mod mastery;
pub mod ports;
pub mod profile;
pub mod selector;
pub mod stepper;
pub mod xp;

use chrono::{DateTime, Utc};

pub use config::LexConfig;
pub use engine::LexEngine;
pub use error::EngineError;

/// Midnight UTC of the day containing `at`.
pub fn utc_day_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(at)
}
