pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub questions: sled::Tree,
    pub questions_by_topic: sled::Tree,
    pub attempts: sled::Tree,
    pub attempt_ids: sled::Tree,
    pub students: sled::Tree,
    pub xp_events: sled::Tree,
    pub lex_sessions: sled::Tree,
    pub badges: sled::Tree,
    pub student_badges: sled::Tree,
    pub lessons: sled::Tree,
    pub lesson_completions: sled::Tree,
    pub homework: sled::Tree,
    pub leaderboard_runs: sled::Tree,
    pub leaderboard_entries: sled::Tree,
    pub leaderboard_by_student: sled::Tree,
    pub daily_snapshots: sled::Tree,
    pub engagement_flags: sled::Tree,
    pub report_queue: sled::Tree,
    pub meta: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl StoreError {
    pub fn not_found(entity: &str, key: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &str, key: &str) -> Self {
        Self::Conflict {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }
}

/// Abort a sled transaction with a typed store error.
pub(crate) fn abort<T>(error: StoreError) -> Result<T, ConflictableTransactionError<StoreError>> {
    Err(ConflictableTransactionError::Abort(error))
}

/// Flatten a multi-tree transaction result into a `StoreError`.
pub(crate) fn flatten_tx_error(error: TransactionError<StoreError>) -> StoreError {
    match error {
        TransactionError::Abort(store_error) => store_error,
        TransactionError::Storage(storage_error) => StoreError::Sled(storage_error),
    }
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let questions = db.open_tree(trees::QUESTIONS)?;
        let questions_by_topic = db.open_tree(trees::QUESTIONS_BY_TOPIC)?;
        let attempts = db.open_tree(trees::ATTEMPTS)?;
        let attempt_ids = db.open_tree(trees::ATTEMPT_IDS)?;
        let students = db.open_tree(trees::STUDENTS)?;
        let xp_events = db.open_tree(trees::XP_EVENTS)?;
        let lex_sessions = db.open_tree(trees::LEX_SESSIONS)?;
        let badges = db.open_tree(trees::BADGES)?;
        let student_badges = db.open_tree(trees::STUDENT_BADGES)?;
        let lessons = db.open_tree(trees::LESSONS)?;
        let lesson_completions = db.open_tree(trees::LESSON_COMPLETIONS)?;
        let homework = db.open_tree(trees::HOMEWORK)?;
        let leaderboard_runs = db.open_tree(trees::LEADERBOARD_RUNS)?;
        let leaderboard_entries = db.open_tree(trees::LEADERBOARD_ENTRIES)?;
        let leaderboard_by_student = db.open_tree(trees::LEADERBOARD_BY_STUDENT)?;
        let daily_snapshots = db.open_tree(trees::DAILY_SNAPSHOTS)?;
        let engagement_flags = db.open_tree(trees::ENGAGEMENT_FLAGS)?;
        let report_queue = db.open_tree(trees::REPORT_QUEUE)?;
        let meta = db.open_tree(trees::META)?;

        Ok(Self {
            db,
            questions,
            questions_by_topic,
            attempts,
            attempt_ids,
            students,
            xp_events,
            lex_sessions,
            badges,
            student_badges,
            lessons,
            lesson_completions,
            homework,
            leaderboard_runs,
            leaderboard_entries,
            leaderboard_by_student,
            daily_snapshots,
            engagement_flags,
            report_queue,
            meta,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use tempfile::TempDir;

    use super::Store;

    /// Open a throwaway store; keep the returned dir alive for the test's duration.
    pub fn temp_store() -> (TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("lex-test.sled").to_str().expect("utf8 path"))
            .expect("open store");
        store.run_migrations().expect("migrations");
        (dir, store)
    }
}
