//! Weekly ranking and the same-day snapshot.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::lex::error::EngineError;
use crate::lex::ports::{LeaderboardRepository, OutboxRepository, StudentRepository, XpLedger};
use crate::lex::utc_day_start;
use crate::store::operations::leaderboard::{LeaderboardEntry, LeaderboardRun};
use crate::store::operations::outbox::{DailyLeaderboardSnapshot, SnapshotRow};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardReport {
    pub run_id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub ranked: usize,
    pub failed: usize,
}

/// Order `(seq, xp)` pairs by XP descending; equal XP keeps insertion order.
/// Returns `(seq, rank)` with ranks 1..=n and no gaps.
pub fn assign_ranks(rows: &[(usize, u64)]) -> Vec<(usize, u32)> {
    let mut ordered = rows.to_vec();
    // stable: ties stay in insertion order
    ordered.sort_by(|a, b| b.1.cmp(&a.1));
    ordered
        .into_iter()
        .enumerate()
        .map(|(idx, (seq, _))| (seq, idx as u32 + 1))
        .collect()
}

/// Rank every student by XP earned in `[now - window, now)`.
///
/// Phase one writes an entry per student with rank 0 and the rank carried
/// over from the window ending at `now - window`; phase two starts only after
/// all of phase one and writes the final ranks. The run record is published
/// last so readers never see a half-ranked run.
pub fn update_weekly_leaderboard<R>(
    repo: &R,
    window_days: i64,
    now: DateTime<Utc>,
) -> Result<LeaderboardReport, EngineError>
where
    R: StudentRepository + XpLedger + LeaderboardRepository + ?Sized,
{
    let window = Duration::days(window_days);
    let period_start = now - window;
    let previous_after = period_start - window;
    let run = LeaderboardRun {
        id: Uuid::new_v4().to_string(),
        period_start,
        period_end: now,
        created_at: now,
    };

    let mut inserted: Vec<(usize, u64)> = Vec::new();
    let mut failed = 0;
    for student_id in repo.list_student_ids()? {
        let seq = inserted.len();
        let phase_one = || -> Result<u64, EngineError> {
            let weekly_xp = repo.xp_sum_between(&student_id, period_start, now)?;
            let previous_rank = repo
                .leaderboard_entry_ending_between(&student_id, previous_after, period_start)?
                .map(|e| e.rank)
                .unwrap_or(0);
            repo.insert_leaderboard_entry(&LeaderboardEntry {
                run_id: run.id.clone(),
                seq,
                student_id: student_id.clone(),
                weekly_xp,
                rank: 0,
                previous_rank,
                period_start,
                period_end: now,
            })?;
            Ok(weekly_xp)
        };
        match phase_one() {
            Ok(weekly_xp) => inserted.push((seq, weekly_xp)),
            Err(e) => {
                failed += 1;
                tracing::warn!(student_id = %student_id, error = %e, "Leaderboard entry skipped");
            }
        }
    }

    for (seq, rank) in assign_ranks(&inserted) {
        repo.set_leaderboard_rank(&run.id, seq, rank)?;
    }
    repo.insert_leaderboard_run(&run)?;

    tracing::info!(
        run_id = %run.id,
        ranked = inserted.len(),
        failed,
        "Weekly leaderboard updated"
    );
    Ok(LeaderboardReport {
        run_id: run.id,
        period_start,
        period_end: now,
        ranked: inserted.len(),
        failed,
    })
}

/// Latest published run with its entries in rank order.
pub fn latest_leaderboard<R>(
    repo: &R,
) -> Result<Option<(LeaderboardRun, Vec<LeaderboardEntry>)>, EngineError>
where
    R: LeaderboardRepository + ?Sized,
{
    let Some(run) = repo.latest_leaderboard_run()? else {
        return Ok(None);
    };
    let mut entries = repo.leaderboard_entries(&run.id)?;
    entries.sort_by_key(|e| (e.rank == 0, e.rank, e.seq));
    Ok(Some((run, entries)))
}

/// XP earned since midnight UTC, top `limit`, stored under today's date.
pub fn build_daily_snapshot<R>(
    repo: &R,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<DailyLeaderboardSnapshot, EngineError>
where
    R: StudentRepository + XpLedger + OutboxRepository + ?Sized,
{
    let day_start = utc_day_start(now);

    let mut totals: Vec<(String, u64)> = Vec::new();
    for student_id in repo.list_student_ids()? {
        match repo.xp_sum_between(&student_id, day_start, now) {
            Ok(xp) => totals.push((student_id, xp)),
            Err(e) => {
                tracing::warn!(student_id = %student_id, error = %e, "Snapshot row skipped")
            }
        }
    }

    let rows: Vec<(usize, u64)> = totals.iter().enumerate().map(|(i, (_, xp))| (i, *xp)).collect();
    let rows = assign_ranks(&rows)
        .into_iter()
        .take(limit)
        .map(|(seq, rank)| SnapshotRow {
            rank,
            student_id: totals[seq].0.clone(),
            xp: totals[seq].1,
        })
        .collect();

    let snapshot = DailyLeaderboardSnapshot {
        date: now.format("%Y-%m-%d").to_string(),
        rows,
        generated_at: now,
    };
    repo.put_daily_snapshot(&snapshot)?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::config::XpConfig;
    use crate::lex::xp::record_xp;
    use crate::store::operations::students::StudentProfile;
    use crate::store::operations::xp_events::XpAction;
    use crate::store::test_support::temp_store;
    use crate::store::Store;

    fn seed(store: &Store, id: &str, xp: u64, at: DateTime<Utc>) {
        if store.get_student(id).unwrap().is_none() {
            store.create_student(&StudentProfile::new(id, id, at)).unwrap();
        }
        if xp > 0 {
            record_xp(store, &XpConfig::default(), id, XpAction::QuizSubmitted, xp, "test", at)
                .unwrap();
        }
    }

    #[test]
    fn ties_keep_insertion_order() {
        let ranks = assign_ranks(&[(0, 50), (1, 80), (2, 80)]);
        assert_eq!(ranks, vec![(1, 1), (2, 2), (0, 3)]);
    }

    #[test]
    fn weekly_run_ranks_and_carries_previous() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        let last_week = now - Duration::days(7);

        seed(&store, "a", 50, now - Duration::days(1));
        seed(&store, "b", 80, now - Duration::days(2));
        seed(&store, "c", 10, now - Duration::days(3));
        // outside the window
        seed(&store, "c", 500, now - Duration::days(9));

        let first = update_weekly_leaderboard(&store, 7, last_week).unwrap();
        let second = update_weekly_leaderboard(&store, 7, now).unwrap();
        assert_eq!(second.ranked, 3);

        let (run, entries) = latest_leaderboard(&store).unwrap().unwrap();
        assert_eq!(run.id, second.run_id);
        let order: Vec<_> = entries
            .iter()
            .map(|e| (e.student_id.as_str(), e.weekly_xp, e.rank))
            .collect();
        assert_eq!(order, vec![("b", 80, 1), ("a", 50, 2), ("c", 10, 3)]);

        // c led the previous window alone
        let c = entries.iter().find(|e| e.student_id == "c").unwrap();
        assert_eq!(c.previous_rank, 1);
        assert!(store
            .leaderboard_entries(&first.run_id)
            .unwrap()
            .iter()
            .all(|e| e.rank > 0));
    }

    #[test]
    fn no_previous_window_means_zero() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        seed(&store, "a", 20, now - Duration::hours(1));
        update_weekly_leaderboard(&store, 7, now).unwrap();
        let (_, entries) = latest_leaderboard(&store).unwrap().unwrap();
        assert_eq!(entries[0].previous_rank, 0);
        assert_eq!(entries[0].rank, 1);
    }

    #[test]
    fn daily_snapshot_counts_today_only() {
        let (_dir, store) = temp_store();
        let now = Utc::now()
            .date_naive()
            .and_hms_opt(18, 0, 0)
            .unwrap()
            .and_utc();
        seed(&store, "a", 30, now - Duration::hours(2));
        seed(&store, "b", 40, now - Duration::days(1));
        seed(&store, "b", 10, now - Duration::hours(1));

        let snapshot = build_daily_snapshot(&store, 1, now).unwrap();
        assert_eq!(snapshot.rows.len(), 1);
        assert_eq!(snapshot.rows[0].student_id, "a");
        assert_eq!(snapshot.rows[0].xp, 30);
        let stored = store.get_daily_snapshot(&snapshot.date).unwrap().unwrap();
        assert_eq!(stored.rows.len(), 1);
    }
}
