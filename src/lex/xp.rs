//! XP policy and the ledger write path.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::lex::config::XpConfig;
use crate::lex::error::EngineError;
use crate::lex::ports::XpLedger;
use crate::store::operations::questions::Difficulty;
use crate::store::operations::xp_events::{XpAction, XpBalance, XpEvent};

/// `floor(xp_total / xp_per_level) + 1`.
pub fn level_for_xp(xp_total: u64, xp_per_level: u64) -> u32 {
    let completed = xp_total.checked_div(xp_per_level).unwrap_or(0);
    u32::try_from(completed).unwrap_or(u32::MAX - 1).saturating_add(1)
}

pub fn base_xp(config: &XpConfig, difficulty: Difficulty) -> u64 {
    match difficulty {
        Difficulty::Easy => config.easy,
        Difficulty::Medium => config.medium,
        Difficulty::Hard => config.hard,
        Difficulty::Unknown => config.unknown,
    }
}

/// XP earned by one answer. Incorrect answers earn nothing; a fast answer
/// without the worked solution earns the floored time bonus.
pub fn answer_xp(
    config: &XpConfig,
    difficulty: Difficulty,
    correct: bool,
    time_taken_secs: u32,
    watched_solution: bool,
) -> u64 {
    if !correct {
        return 0;
    }
    let base = base_xp(config, difficulty);
    if !watched_solution && time_taken_secs <= config.time_bonus_threshold_secs {
        (base as f64 * config.time_bonus_multiplier).floor() as u64
    } else {
        base
    }
}

/// Append one XP event and fold it into the student's materialized total.
pub fn record_xp<L>(
    ledger: &L,
    config: &XpConfig,
    student_id: &str,
    action: XpAction,
    amount: u64,
    trigger: &str,
    now: DateTime<Utc>,
) -> Result<XpBalance, EngineError>
where
    L: XpLedger + ?Sized,
{
    let event = XpEvent {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        action,
        xp_amount: amount,
        date: now,
        trigger: trigger.to_string(),
    };
    let balance = ledger.append_xp_event(&event, config.xp_per_level)?;

    tracing::debug!(
        student_id,
        action = action.as_str(),
        amount,
        xp_total = balance.xp_total,
        "XP recorded"
    );
    if balance.leveled_up() {
        tracing::info!(
            student_id,
            from = balance.previous_level,
            to = balance.current_level,
            "Student leveled up"
        );
    }
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::ports::StudentRepository;
    use crate::store::operations::students::StudentProfile;
    use crate::store::test_support::temp_store;

    #[test]
    fn level_boundaries() {
        assert_eq!(level_for_xp(0, 200), 1);
        assert_eq!(level_for_xp(199, 200), 1);
        assert_eq!(level_for_xp(200, 200), 2);
        assert_eq!(level_for_xp(205, 200), 2);
        assert_eq!(level_for_xp(1000, 0), 1);
    }

    #[test]
    fn answer_policy() {
        let cfg = XpConfig::default();
        assert_eq!(answer_xp(&cfg, Difficulty::Easy, true, 60, false), 10);
        assert_eq!(answer_xp(&cfg, Difficulty::Medium, true, 60, false), 20);
        assert_eq!(answer_xp(&cfg, Difficulty::Hard, true, 60, false), 30);
        assert_eq!(answer_xp(&cfg, Difficulty::Unknown, true, 60, false), 15);
        assert_eq!(answer_xp(&cfg, Difficulty::Hard, false, 5, false), 0);
    }

    #[test]
    fn time_bonus_is_floored_and_forfeited_by_solution() {
        let cfg = XpConfig::default();
        assert_eq!(answer_xp(&cfg, Difficulty::Unknown, true, 30, false), 18);
        assert_eq!(answer_xp(&cfg, Difficulty::Easy, true, 10, false), 12);
        assert_eq!(answer_xp(&cfg, Difficulty::Easy, true, 10, true), 10);
        assert_eq!(answer_xp(&cfg, Difficulty::Easy, true, 31, false), 10);
    }

    #[test]
    fn record_xp_reports_level_up() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        let mut profile = StudentProfile::new("s1", "Sam", now);
        profile.set_xp_total(195, 200);
        store.create_student(&profile).unwrap();
        // materialized total without a ledger row; only the delta matters here
        let balance = record_xp(
            &store,
            &XpConfig::default(),
            "s1",
            XpAction::QuizSubmitted,
            10,
            "quiz",
            now,
        )
        .unwrap();
        assert_eq!(balance.xp_total, 205);
        assert!(balance.leveled_up());
        assert_eq!(balance.current_level, 2);
    }

    #[test]
    fn record_xp_unknown_student_is_not_found() {
        let (_dir, store) = temp_store();
        let err = record_xp(
            &store,
            &XpConfig::default(),
            "ghost",
            XpAction::QuizSubmitted,
            10,
            "quiz",
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }
}
