//! Daily: streaks, inactivity flags and the same-day leaderboard snapshot (01:00).

use crate::lex::LexEngine;

pub async fn run(engine: &LexEngine) {
    tracing::info!("Daily maintenance worker running");

    match engine.run_daily_maintenance().await {
        Ok(report) => tracing::info!(
            date = %report.date,
            students = report.students,
            advanced = report.streaks_advanced,
            reset = report.streaks_reset,
            flagged = report.flagged_inactive,
            failed = report.failed,
            "Daily maintenance finished"
        ),
        Err(e) => tracing::error!(error = %e, "Daily maintenance failed"),
    }
}
