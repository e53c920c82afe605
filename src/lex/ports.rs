//! Repository interfaces the Lex algorithms depend on.
//!
//! The engine never touches sled trees directly; every access pattern it needs
//! is named here and implemented by [`crate::store::Store`] in
//! `store/operations/*`.

use chrono::{DateTime, Utc};

use crate::store::operations::attempts::QuestionAttempt;
use crate::store::operations::badges::{Badge, StudentBadge};
use crate::store::operations::coursework::{HomeworkAssignment, Lesson, LessonCompletion};
use crate::store::operations::leaderboard::{LeaderboardEntry, LeaderboardRun};
use crate::store::operations::outbox::{DailyLeaderboardSnapshot, EngagementFlag, ParentReportJob};
use crate::store::operations::questions::Question;
use crate::store::operations::sessions::IssuedSession;
use crate::store::operations::students::StudentProfile;
use crate::store::operations::xp_events::{XpBalance, XpEvent};
use crate::store::StoreError;

pub trait QuestionRepository {
    fn get_question(&self, question_id: &str) -> Result<Option<Question>, StoreError>;
    fn list_questions(&self) -> Result<Vec<Question>, StoreError>;
    fn list_questions_by_topic(&self, topic: &str) -> Result<Vec<Question>, StoreError>;
    fn upsert_question(&self, question: &Question) -> Result<(), StoreError>;
}

pub trait AttemptRepository {
    /// Append one attempt. Returns `false` when an attempt with the same id
    /// was already recorded (the log is write-once).
    fn append_attempt(&self, attempt: &QuestionAttempt) -> Result<bool, StoreError>;
    /// Newest first, at most `limit`.
    fn recent_attempts(
        &self,
        student_id: &str,
        limit: usize,
    ) -> Result<Vec<QuestionAttempt>, StoreError>;
    /// Newest first, every attempt with `attempt_date >= since`.
    fn attempts_since(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<QuestionAttempt>, StoreError>;
    /// Full history, newest first.
    fn all_attempts(&self, student_id: &str) -> Result<Vec<QuestionAttempt>, StoreError>;
}

pub trait SessionRepository {
    /// `Conflict` when the id is already issued.
    fn insert_issued_session(&self, session: &IssuedSession) -> Result<(), StoreError>;
    fn get_issued_session(
        &self,
        student_id: &str,
        session_id: &str,
    ) -> Result<Option<IssuedSession>, StoreError>;
    /// Mark the session completed at `at`. `NotFound` for an unknown session,
    /// `Conflict` when it was already completed.
    fn close_issued_session(
        &self,
        student_id: &str,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<IssuedSession, StoreError>;
}

pub trait StudentRepository {
    fn get_student(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError>;
    fn list_student_ids(&self) -> Result<Vec<String>, StoreError>;
    /// Insert a new profile; `Conflict` when the id is taken.
    fn create_student(&self, profile: &StudentProfile) -> Result<(), StoreError>;
    /// Atomic read-modify-write of one profile. `apply` may run more than once
    /// under contention and must be side-effect free.
    fn update_student(
        &self,
        student_id: &str,
        apply: &dyn Fn(&mut StudentProfile),
    ) -> Result<StudentProfile, StoreError>;
}

pub trait XpLedger {
    /// Append `event` and fold its amount into the student's materialized
    /// total in one transaction.
    fn append_xp_event(&self, event: &XpEvent, xp_per_level: u64) -> Result<XpBalance, StoreError>;
    /// Sum of `xp_amount` for events in `[start, end)`.
    fn xp_sum_between(
        &self,
        student_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
    /// Whether any event, including zero-amount ones, falls in `[start, end)`.
    fn has_xp_between(
        &self,
        student_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
    fn xp_events_for(&self, student_id: &str) -> Result<Vec<XpEvent>, StoreError>;
    /// Sum of every event the student ever received.
    fn ledger_total(&self, student_id: &str) -> Result<u64, StoreError>;
}

pub trait BadgeRepository {
    fn list_badges(&self) -> Result<Vec<Badge>, StoreError>;
    fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>, StoreError>;
    fn upsert_badge(&self, badge: &Badge) -> Result<(), StoreError>;
    fn student_badges(&self, student_id: &str) -> Result<Vec<StudentBadge>, StoreError>;
    /// Insert the badge, append its XP event and update the student's totals
    /// as one unit. `Conflict` if the pair exists, `NotFound` if the student
    /// does not; nothing is written in either case.
    fn award_badge_atomically(
        &self,
        award: &StudentBadge,
        grant: &XpEvent,
        xp_per_level: u64,
    ) -> Result<XpBalance, StoreError>;
}

pub trait LeaderboardRepository {
    fn insert_leaderboard_run(&self, run: &LeaderboardRun) -> Result<(), StoreError>;
    fn insert_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<(), StoreError>;
    fn set_leaderboard_rank(&self, run_id: &str, seq: usize, rank: u32) -> Result<(), StoreError>;
    fn latest_leaderboard_run(&self) -> Result<Option<LeaderboardRun>, StoreError>;
    /// Entries of one run in insertion order.
    fn leaderboard_entries(&self, run_id: &str) -> Result<Vec<LeaderboardEntry>, StoreError>;
    /// The student's entry from the newest run whose window ended in
    /// `(after, until]`.
    fn leaderboard_entry_ending_between(
        &self,
        student_id: &str,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<LeaderboardEntry>, StoreError>;
}

pub trait CourseworkRepository {
    /// `Conflict` when the lesson id is taken.
    fn create_lesson(&self, lesson: &Lesson) -> Result<(), StoreError>;
    fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, StoreError>;
    /// Returns `false` when the lesson was already completed.
    fn record_lesson_completion(&self, completion: &LessonCompletion) -> Result<bool, StoreError>;
    fn lesson_completions(&self, student_id: &str) -> Result<Vec<LessonCompletion>, StoreError>;
    fn create_homework(&self, assignment: &HomeworkAssignment) -> Result<(), StoreError>;
    fn get_homework(
        &self,
        student_id: &str,
        homework_id: &str,
    ) -> Result<Option<HomeworkAssignment>, StoreError>;
    fn save_homework(&self, assignment: &HomeworkAssignment) -> Result<(), StoreError>;
    fn list_homework(&self, student_id: &str) -> Result<Vec<HomeworkAssignment>, StoreError>;
}

pub trait OutboxRepository {
    fn put_engagement_flag(&self, flag: &EngagementFlag) -> Result<(), StoreError>;
    fn engagement_flags_on(&self, date: &str) -> Result<Vec<EngagementFlag>, StoreError>;
    /// Returns `false` when a job for the same week and student is queued.
    fn enqueue_parent_report(&self, job: &ParentReportJob) -> Result<bool, StoreError>;
    fn put_daily_snapshot(&self, snapshot: &DailyLeaderboardSnapshot) -> Result<(), StoreError>;
    fn get_daily_snapshot(&self, date: &str)
        -> Result<Option<DailyLeaderboardSnapshot>, StoreError>;
}

/// Everything the engine needs from persistence.
pub trait LexRepository:
    QuestionRepository
    + AttemptRepository
    + SessionRepository
    + StudentRepository
    + XpLedger
    + BadgeRepository
    + LeaderboardRepository
    + CourseworkRepository
    + OutboxRepository
{
}

impl<T> LexRepository for T where
    T: QuestionRepository
        + AttemptRepository
        + SessionRepository
        + StudentRepository
        + XpLedger
        + BadgeRepository
        + LeaderboardRepository
        + CourseworkRepository
        + OutboxRepository
{
}
