//! Daily and weekly housekeeping.
//!
//! Students are processed independently: a failure for one student is logged
//! with its id, counted in the report and never stops the batch. Every step is
//! safe to re-run for the same day or week.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::lex::badges::{award_badge, check_eligibility};
use crate::lex::bank::QuestionBank;
use crate::lex::config::LexConfig;
use crate::lex::coursework::sweep_overdue;
use crate::lex::error::EngineError;
use crate::lex::leaderboard::{build_daily_snapshot, update_weekly_leaderboard, LeaderboardReport};
use crate::lex::ports::LexRepository;
use crate::lex::utc_day_start;
use crate::store::operations::outbox::{EngagementFlag, ParentReportJob, ReportJobStatus};

/// Runs one student's share of a batch under whatever per-student exclusion
/// the host provides.
pub trait StudentScope {
    fn scoped(
        &self,
        student_id: &str,
        work: &mut dyn FnMut() -> Result<(), EngineError>,
    ) -> Result<(), EngineError>;
}

/// No exclusion; for single-threaded callers and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unscoped;

impl StudentScope for Unscoped {
    fn scoped(
        &self,
        _student_id: &str,
        work: &mut dyn FnMut() -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        work()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    Advanced,
    Reset,
    Unchanged,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub date: String,
    pub students: usize,
    pub streaks_advanced: usize,
    pub streaks_reset: usize,
    pub flagged_inactive: usize,
    pub snapshot_rows: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub week_ending: String,
    pub students: usize,
    pub xp_repaired: usize,
    pub leaderboard: Option<LeaderboardReport>,
    pub badges_awarded: usize,
    pub homework_overdue: usize,
    pub reports_enqueued: usize,
    pub failed: usize,
}

/// Advance the streak when the student earned XP today; clear it when there
/// was none today or yesterday; otherwise leave it. A second run on the same
/// day does not advance twice.
pub fn update_streak<R>(repo: &R, student_id: &str, now: DateTime<Utc>) -> Result<StreakChange, EngineError>
where
    R: LexRepository + ?Sized,
{
    let today = now.date_naive();
    let today_start = utc_day_start(now);
    let tomorrow_start = today_start + Duration::days(1);
    let yesterday_start = today_start - Duration::days(1);

    let profile = repo
        .get_student(student_id)?
        .ok_or_else(|| EngineError::not_found("student", student_id))?;
    let active_today = repo.has_xp_between(student_id, today_start, tomorrow_start)?;
    let active_yesterday = repo.has_xp_between(student_id, yesterday_start, today_start)?;

    let change = if active_today {
        if profile.streak_updated_on == Some(today) {
            StreakChange::Unchanged
        } else {
            StreakChange::Advanced
        }
    } else if !active_yesterday && profile.study_streak > 0 {
        StreakChange::Reset
    } else {
        StreakChange::Unchanged
    };

    match change {
        StreakChange::Advanced => {
            repo.update_student(student_id, &|p| {
                if p.streak_updated_on != Some(today) {
                    p.study_streak = p.study_streak.saturating_add(1);
                    p.streak_updated_on = Some(today);
                }
            })?;
        }
        StreakChange::Reset => {
            repo.update_student(student_id, &|p| p.study_streak = 0)?;
        }
        StreakChange::Unchanged => {}
    }
    Ok(change)
}

/// Record an engagement flag when the student has been quiet for at least
/// `inactive_after_days`. Returns whether a flag was written.
pub fn flag_if_inactive<R>(
    repo: &R,
    student_id: &str,
    inactive_after_days: i64,
    now: DateTime<Utc>,
) -> Result<bool, EngineError>
where
    R: LexRepository + ?Sized,
{
    let profile = repo
        .get_student(student_id)?
        .ok_or_else(|| EngineError::not_found("student", student_id))?;
    let last_activity = profile.last_activity();
    let days_inactive = (now - last_activity).num_days();
    if days_inactive < inactive_after_days {
        return Ok(false);
    }
    repo.put_engagement_flag(&EngagementFlag {
        date: now.format("%Y-%m-%d").to_string(),
        student_id: student_id.to_string(),
        days_inactive,
        last_activity,
    })?;
    Ok(true)
}

/// Re-derive the materialized XP total (and level) from the ledger. Returns
/// whether the stored total had drifted.
pub fn reconcile_xp<R>(repo: &R, student_id: &str, xp_per_level: u64) -> Result<bool, EngineError>
where
    R: LexRepository + ?Sized,
{
    let ledger_total = repo.ledger_total(student_id)?;
    let profile = repo
        .get_student(student_id)?
        .ok_or_else(|| EngineError::not_found("student", student_id))?;
    let expected_level = crate::lex::xp::level_for_xp(ledger_total, xp_per_level);
    if profile.xp_total == ledger_total && profile.current_level == expected_level {
        return Ok(false);
    }
    tracing::warn!(
        student_id,
        stored = profile.xp_total,
        ledger = ledger_total,
        "XP total drifted from ledger, repairing"
    );
    repo.update_student(student_id, &|p| p.set_xp_total(ledger_total, xp_per_level))?;
    Ok(true)
}

pub fn run_daily_maintenance<R, S>(
    repo: &R,
    config: &LexConfig,
    scope: &S,
    now: DateTime<Utc>,
) -> Result<DailyReport, EngineError>
where
    R: LexRepository + ?Sized,
    S: StudentScope + ?Sized,
{
    let student_ids = repo.list_student_ids()?;
    let mut report = DailyReport {
        date: now.format("%Y-%m-%d").to_string(),
        students: student_ids.len(),
        ..DailyReport::default()
    };

    for student_id in &student_ids {
        let mut work = || -> Result<(), EngineError> {
            match update_streak(repo, student_id, now)? {
                StreakChange::Advanced => report.streaks_advanced += 1,
                StreakChange::Reset => report.streaks_reset += 1,
                StreakChange::Unchanged => {}
            }
            if flag_if_inactive(repo, student_id, config.maintenance.inactive_after_days, now)? {
                report.flagged_inactive += 1;
            }
            Ok(())
        };
        if let Err(e) = scope.scoped(student_id, &mut work) {
            report.failed += 1;
            tracing::warn!(student_id = %student_id, error = %e, "Daily maintenance failed for student");
        }
    }

    let snapshot = build_daily_snapshot(repo, config.maintenance.daily_snapshot_size, now)?;
    report.snapshot_rows = snapshot.rows.len();

    tracing::info!(
        date = %report.date,
        students = report.students,
        advanced = report.streaks_advanced,
        reset = report.streaks_reset,
        flagged = report.flagged_inactive,
        failed = report.failed,
        "Daily maintenance complete"
    );
    Ok(report)
}

pub fn run_weekly_maintenance<R, S>(
    repo: &R,
    config: &LexConfig,
    scope: &S,
    now: DateTime<Utc>,
) -> Result<WeeklyReport, EngineError>
where
    R: LexRepository + ?Sized,
    S: StudentScope + ?Sized,
{
    let student_ids = repo.list_student_ids()?;
    let week_ending = now.format("%Y-%m-%d").to_string();
    let mut report = WeeklyReport {
        week_ending: week_ending.clone(),
        students: student_ids.len(),
        ..WeeklyReport::default()
    };

    for student_id in &student_ids {
        let mut work = || -> Result<(), EngineError> {
            if reconcile_xp(repo, student_id, config.xp.xp_per_level)? {
                report.xp_repaired += 1;
            }
            Ok(())
        };
        if let Err(e) = scope.scoped(student_id, &mut work) {
            report.failed += 1;
            tracing::warn!(student_id = %student_id, error = %e, "XP reconcile failed for student");
        }
    }

    report.leaderboard = Some(update_weekly_leaderboard(
        repo,
        config.maintenance.leaderboard_window_days,
        now,
    )?);

    let bank = QuestionBank::load(repo)?;
    for student_id in &student_ids {
        let mut work = || -> Result<(), EngineError> {
            for badge_id in check_eligibility(repo, &bank, student_id)? {
                match award_badge(repo, &config.xp, student_id, &badge_id, now) {
                    Ok(_) => report.badges_awarded += 1,
                    // awarded concurrently since the eligibility check
                    Err(EngineError::Conflict { .. }) => {}
                    Err(e) => return Err(e),
                }
            }

            report.homework_overdue += sweep_overdue(repo, student_id, now)?;

            let profile = repo
                .get_student(student_id)?
                .ok_or_else(|| EngineError::not_found("student", student_id))?;
            if let Some(parent_id) = profile.parent_id {
                let queued = repo.enqueue_parent_report(&ParentReportJob {
                    week_ending: week_ending.clone(),
                    student_id: student_id.clone(),
                    parent_id,
                    status: ReportJobStatus::Queued,
                    enqueued_at: now,
                })?;
                if queued {
                    report.reports_enqueued += 1;
                }
            }
            Ok(())
        };
        if let Err(e) = scope.scoped(student_id, &mut work) {
            report.failed += 1;
            tracing::warn!(student_id = %student_id, error = %e, "Weekly maintenance failed for student");
        }
    }

    tracing::info!(
        week_ending = %report.week_ending,
        students = report.students,
        xp_repaired = report.xp_repaired,
        badges = report.badges_awarded,
        overdue = report.homework_overdue,
        reports = report.reports_enqueued,
        failed = report.failed,
        "Weekly maintenance complete"
    );
    Ok(report)
}
