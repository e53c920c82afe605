//! Maintenance outputs handed to external collaborators: engagement follow-up
//! lists, the parent-report queue and same-day leaderboard snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lex::ports::OutboxRepository;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementFlag {
    /// `YYYY-MM-DD` of the daily run that raised it.
    pub date: String,
    pub student_id: String,
    pub days_inactive: i64,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportJobStatus {
    Queued,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReportJob {
    pub week_ending: String,
    pub student_id: String,
    pub parent_id: String,
    pub status: ReportJobStatus,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub rank: u32,
    pub student_id: String,
    pub xp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLeaderboardSnapshot {
    pub date: String,
    pub rows: Vec<SnapshotRow>,
    pub generated_at: DateTime<Utc>,
}

impl OutboxRepository for Store {
    fn put_engagement_flag(&self, flag: &EngagementFlag) -> Result<(), StoreError> {
        let key = keys::engagement_flag_key(&flag.date, &flag.student_id)?;
        self.engagement_flags
            .insert(key.as_bytes(), Self::serialize(flag)?)?;
        Ok(())
    }

    fn engagement_flags_on(&self, date: &str) -> Result<Vec<EngagementFlag>, StoreError> {
        let prefix = keys::engagement_flag_prefix(date);
        let mut out = Vec::new();
        for item in self.engagement_flags.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            out.push(Self::deserialize::<EngagementFlag>(&raw)?);
        }
        Ok(out)
    }

    fn enqueue_parent_report(&self, job: &ParentReportJob) -> Result<bool, StoreError> {
        let key = keys::report_job_key(&job.week_ending, &job.student_id)?;
        let cas = self.report_queue.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(job)?),
        )?;
        Ok(cas.is_ok())
    }

    fn put_daily_snapshot(&self, snapshot: &DailyLeaderboardSnapshot) -> Result<(), StoreError> {
        let key = keys::daily_snapshot_key(&snapshot.date);
        self.daily_snapshots
            .insert(key.as_bytes(), Self::serialize(snapshot)?)?;
        Ok(())
    }

    fn get_daily_snapshot(
        &self,
        date: &str,
    ) -> Result<Option<DailyLeaderboardSnapshot>, StoreError> {
        let key = keys::daily_snapshot_key(date);
        match self.daily_snapshots.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }
}

impl Store {
    pub fn count_queued_reports(&self) -> usize {
        self.report_queue.len()
    }
}
