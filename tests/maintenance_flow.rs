use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use lex_backend::lex::config::XpConfig;
use lex_backend::lex::ports::StudentRepository;
use lex_backend::lex::xp::record_xp;
use lex_backend::lex::{LexConfig, LexEngine};
use lex_backend::store::operations::students::StudentProfile;
use lex_backend::store::operations::xp_events::XpAction;
use lex_backend::store::Store;

fn midday() -> DateTime<Utc> {
    Utc::now().date_naive().and_hms_opt(12, 0, 0).unwrap().and_utc()
}

fn engine() -> (tempfile::TempDir, LexEngine) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("maintenance.sled").to_str().unwrap()).unwrap();
    store.run_migrations().unwrap();
    (dir, LexEngine::new(LexConfig::default(), Arc::new(store)))
}

fn student(store: &Store, id: &str, now: DateTime<Utc>, last_login_days_ago: i64) {
    store
        .create_student(&StudentProfile::new(id, id, now - Duration::days(10)))
        .unwrap();
    store
        .update_student(id, &|p| p.last_login = Some(now - Duration::days(last_login_days_ago)))
        .unwrap();
}

#[tokio::test]
async fn daily_run_advances_resets_and_flags_once_per_day() {
    let (_dir, engine) = engine();
    let store = engine.store().clone();
    let now = midday();

    student(&store, "active", now, 0);
    record_xp(
        store.as_ref(),
        &XpConfig::default(),
        "active",
        XpAction::QuizSubmitted,
        10,
        "quiz",
        now - Duration::hours(1),
    )
    .unwrap();

    student(&store, "lapsed", now, 5);
    store.update_student("lapsed", &|p| p.study_streak = 4).unwrap();

    let first = engine.run_daily_maintenance_at(now).await.unwrap();
    assert_eq!(first.students, 2);
    assert_eq!(first.streaks_advanced, 1);
    assert_eq!(first.streaks_reset, 1);
    assert_eq!(first.flagged_inactive, 1);
    assert_eq!(first.failed, 0);

    let second = engine.run_daily_maintenance_at(now).await.unwrap();
    assert_eq!(second.streaks_advanced, 0);
    assert_eq!(second.streaks_reset, 0);

    assert_eq!(store.get_student("active").unwrap().unwrap().study_streak, 1);
    assert_eq!(store.get_student("lapsed").unwrap().unwrap().study_streak, 0);
}

#[tokio::test]
async fn weekly_run_repairs_drifted_totals() {
    let (_dir, engine) = engine();
    let store = engine.store().clone();
    let now = midday();

    student(&store, "s1", now, 0);
    record_xp(
        store.as_ref(),
        &XpConfig::default(),
        "s1",
        XpAction::LessonCompleted,
        25,
        "lesson_l1",
        now - Duration::days(1),
    )
    .unwrap();
    store
        .update_student("s1", &|p| p.set_xp_total(999, 200))
        .unwrap();

    let report = engine.run_weekly_maintenance_at(now).await.unwrap();
    assert_eq!(report.xp_repaired, 1);
    assert_eq!(report.leaderboard.as_ref().unwrap().ranked, 1);

    let profile = store.get_student("s1").unwrap().unwrap();
    assert_eq!(profile.xp_total, 25);
    assert_eq!(profile.current_level, 1);

    let again = engine.run_weekly_maintenance_at(now + Duration::minutes(1)).await.unwrap();
    assert_eq!(again.xp_repaired, 0);
}
