//! Weekly: XP reconciliation, leaderboard, badges, overdue homework and
//! parent reports (Monday 06:30).

use crate::lex::LexEngine;

pub async fn run(engine: &LexEngine) {
    tracing::info!("Weekly maintenance worker running");

    match engine.run_weekly_maintenance().await {
        Ok(report) => tracing::info!(
            week_ending = %report.week_ending,
            students = report.students,
            xp_repaired = report.xp_repaired,
            badges = report.badges_awarded,
            overdue = report.homework_overdue,
            reports = report.reports_enqueued,
            failed = report.failed,
            "Weekly maintenance finished"
        ),
        Err(e) => tracing::error!(error = %e, "Weekly maintenance failed"),
    }
}
