pub const QUESTIONS: &str = "questions";
pub const QUESTIONS_BY_TOPIC: &str = "questions_by_topic";
pub const ATTEMPTS: &str = "attempts";
pub const ATTEMPT_IDS: &str = "attempt_ids";
pub const STUDENTS: &str = "students";
pub const XP_EVENTS: &str = "xp_events";
pub const LEX_SESSIONS: &str = "lex_sessions";

// Gamification
pub const BADGES: &str = "badges";
pub const STUDENT_BADGES: &str = "student_badges";
pub const LEADERBOARD_RUNS: &str = "leaderboard_runs";
pub const LEADERBOARD_ENTRIES: &str = "leaderboard_entries";
pub const LEADERBOARD_BY_STUDENT: &str = "leaderboard_by_student";

// Coursework
pub const LESSONS: &str = "lessons";
pub const LESSON_COMPLETIONS: &str = "lesson_completions";
pub const HOMEWORK: &str = "homework";

// Maintenance outputs
pub const DAILY_SNAPSHOTS: &str = "daily_snapshots";
pub const ENGAGEMENT_FLAGS: &str = "engagement_flags";
pub const REPORT_QUEUE: &str = "report_queue";

pub const META: &str = "meta";
