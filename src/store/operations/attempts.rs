use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::lex::ports::AttemptRepository;
use crate::store::keys;
use crate::store::{abort, flatten_tx_error, Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAttempt {
    pub id: String,
    pub student_id: String,
    pub question_id: String,
    pub attempt_date: DateTime<Utc>,
    pub correct: bool,
    /// Seconds.
    pub time_taken: u32,
    #[serde(default)]
    pub watched_solution: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Store {
    /// Scan a student's attempts newest first, stopping when `keep_going`
    /// returns false. Malformed records are skipped with a warning.
    fn scan_attempts<F>(&self, student_id: &str, mut keep_going: F) -> Result<(), StoreError>
    where
        F: FnMut(QuestionAttempt) -> bool,
    {
        let prefix = keys::attempt_prefix(student_id)?;
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let (key, raw) = item?;
            let attempt = match Self::deserialize::<QuestionAttempt>(&raw) {
                Ok(attempt) => attempt,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        student_id,
                        key = %String::from_utf8_lossy(&key),
                        "Skipping malformed attempt record"
                    );
                    continue;
                }
            };
            if !keep_going(attempt) {
                break;
            }
        }
        Ok(())
    }

    pub fn count_attempts(&self, student_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::attempt_prefix(student_id)?;
        let mut count = 0usize;
        for item in self.attempts.scan_prefix(prefix.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }
}

impl AttemptRepository for Store {
    fn append_attempt(&self, attempt: &QuestionAttempt) -> Result<bool, StoreError> {
        let key = keys::attempt_key(
            &attempt.student_id,
            attempt.attempt_date.timestamp_millis(),
            &attempt.id,
        )?;
        let id_key = keys::attempt_id_key(&attempt.id)?;
        let bytes = Self::serialize(attempt)?;

        let result = (&self.attempts, &self.attempt_ids).transaction(|(tx_attempts, tx_ids)| {
            if tx_ids.get(id_key.as_bytes())?.is_some() {
                return abort(StoreError::conflict("attempt", &attempt.id));
            }
            tx_ids.insert(id_key.as_bytes(), key.as_bytes())?;
            tx_attempts.insert(key.as_bytes(), bytes.as_slice())?;
            Ok(())
        });

        match result.map_err(flatten_tx_error) {
            Ok(()) => Ok(true),
            Err(StoreError::Conflict { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn recent_attempts(
        &self,
        student_id: &str,
        limit: usize,
    ) -> Result<Vec<QuestionAttempt>, StoreError> {
        let mut out = Vec::with_capacity(limit.min(256));
        if limit == 0 {
            return Ok(out);
        }
        self.scan_attempts(student_id, |attempt| {
            out.push(attempt);
            out.len() < limit
        })?;
        Ok(out)
    }

    fn attempts_since(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<QuestionAttempt>, StoreError> {
        let mut out = Vec::new();
        self.scan_attempts(student_id, |attempt| {
            if attempt.attempt_date < since {
                return false;
            }
            out.push(attempt);
            true
        })?;
        Ok(out)
    }

    fn all_attempts(&self, student_id: &str) -> Result<Vec<QuestionAttempt>, StoreError> {
        let mut out = Vec::new();
        self.scan_attempts(student_id, |attempt| {
            out.push(attempt);
            true
        })?;
        Ok(out)
    }
}

#[cfg(test)]
pub(crate) fn sample_attempt(
    id: &str,
    student_id: &str,
    question_id: &str,
    correct: bool,
    attempt_date: DateTime<Utc>,
) -> QuestionAttempt {
    QuestionAttempt {
        id: id.to_string(),
        student_id: student_id.to_string(),
        question_id: question_id.to_string(),
        attempt_date,
        correct,
        time_taken: 45,
        watched_solution: false,
        session_id: None,
    }
}
