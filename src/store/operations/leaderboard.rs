use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lex::ports::LeaderboardRepository;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRun {
    pub id: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub run_id: String,
    /// Insertion order within the run; the tie-breaker.
    pub seq: usize,
    pub student_id: String,
    pub weekly_xp: u64,
    /// 1-based; 0 until the ranking phase has run.
    pub rank: u32,
    pub previous_rank: u32,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl Store {
    fn get_leaderboard_entry_by_key(&self, key: &[u8]) -> Result<Option<LeaderboardEntry>, StoreError> {
        match self.leaderboard_entries.get(key)? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

impl LeaderboardRepository for Store {
    fn insert_leaderboard_run(&self, run: &LeaderboardRun) -> Result<(), StoreError> {
        let key = keys::leaderboard_run_key(run.period_end.timestamp_millis(), &run.id)?;
        self.leaderboard_runs
            .insert(key.as_bytes(), Self::serialize(run)?)?;
        Ok(())
    }

    fn insert_leaderboard_entry(&self, entry: &LeaderboardEntry) -> Result<(), StoreError> {
        let key = keys::leaderboard_entry_key(&entry.run_id, entry.seq)?;
        let student_key =
            keys::leaderboard_student_key(&entry.student_id, entry.period_end.timestamp_millis())?;
        self.leaderboard_entries
            .insert(key.as_bytes(), Self::serialize(entry)?)?;
        // Index points at the entry; rebuilt on every run for that window end.
        self.leaderboard_by_student
            .insert(student_key.as_bytes(), key.as_bytes())?;
        Ok(())
    }

    fn set_leaderboard_rank(&self, run_id: &str, seq: usize, rank: u32) -> Result<(), StoreError> {
        let key = keys::leaderboard_entry_key(run_id, seq)?;
        let mut entry = self
            .get_leaderboard_entry_by_key(key.as_bytes())?
            .ok_or_else(|| StoreError::not_found("leaderboard_entry", &key))?;
        entry.rank = rank;
        self.leaderboard_entries
            .insert(key.as_bytes(), Self::serialize(&entry)?)?;
        Ok(())
    }

    fn latest_leaderboard_run(&self) -> Result<Option<LeaderboardRun>, StoreError> {
        match self.leaderboard_runs.iter().next() {
            Some(item) => {
                let (_, raw) = item?;
                Ok(Some(Self::deserialize(&raw)?))
            }
            None => Ok(None),
        }
    }

    fn leaderboard_entries(&self, run_id: &str) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let prefix = keys::leaderboard_entry_prefix(run_id)?;
        let mut out = Vec::new();
        for item in self.leaderboard_entries.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            out.push(Self::deserialize::<LeaderboardEntry>(&raw)?);
        }
        Ok(out)
    }

    fn leaderboard_entry_ending_between(
        &self,
        student_id: &str,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<LeaderboardEntry>, StoreError> {
        let prefix = keys::leaderboard_student_prefix(student_id)?;
        let after_ms = after.timestamp_millis();
        let until_ms = until.timestamp_millis();

        // Newest window end first.
        for item in self.leaderboard_by_student.scan_prefix(prefix.as_bytes()) {
            let (key, entry_key) = item?;
            let Some(end_ms) = keys::parse_leaderboard_student_end_ms(&key) else {
                continue;
            };
            if end_ms > until_ms {
                continue;
            }
            if end_ms <= after_ms {
                break;
            }
            return self.get_leaderboard_entry_by_key(&entry_key);
        }
        Ok(None)
    }
}
