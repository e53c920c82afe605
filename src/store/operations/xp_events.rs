use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::Transactional;

use crate::lex::ports::XpLedger;
use crate::store::keys;
use crate::store::operations::students::StudentProfile;
use crate::store::{abort, flatten_tx_error, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XpAction {
    LessonCompleted,
    QuizSubmitted,
    HomeworkCompleted,
    LexSession,
    BadgeEarned,
}

impl XpAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LessonCompleted => "lesson_completed",
            Self::QuizSubmitted => "quiz_submitted",
            Self::HomeworkCompleted => "homework_completed",
            Self::LexSession => "lex_session",
            Self::BadgeEarned => "badge_earned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpEvent {
    pub id: String,
    pub student_id: String,
    pub action: XpAction,
    pub xp_amount: u64,
    pub date: DateTime<Utc>,
    /// Free-text provenance, e.g. `badge_<id>`.
    pub trigger: String,
}

/// Student totals before and after one ledger append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpBalance {
    pub previous_total: u64,
    pub xp_total: u64,
    pub previous_level: u32,
    pub current_level: u32,
}

impl XpBalance {
    pub fn leveled_up(&self) -> bool {
        self.current_level > self.previous_level
    }
}

/// Inside a transaction: fold `event` into the student's totals and append it.
/// Shared by the plain ledger append and the badge award.
pub(crate) fn apply_xp_in_tx(
    tx_events: &TransactionalTree,
    tx_students: &TransactionalTree,
    event_key: &str,
    event_bytes: &[u8],
    event: &XpEvent,
    xp_per_level: u64,
) -> Result<XpBalance, ConflictableTransactionError<StoreError>> {
    let student_key = keys::student_key(&event.student_id)
        .map_err(ConflictableTransactionError::Abort)?;
    let Some(raw) = tx_students.get(student_key.as_bytes())? else {
        return abort(StoreError::not_found("student", &event.student_id));
    };
    let mut profile: StudentProfile =
        Store::deserialize(&raw).map_err(ConflictableTransactionError::Abort)?;

    let previous_total = profile.xp_total;
    let previous_level = profile.current_level;
    profile.set_xp_total(previous_total.saturating_add(event.xp_amount), xp_per_level);

    let profile_bytes = Store::serialize(&profile).map_err(ConflictableTransactionError::Abort)?;
    tx_students.insert(student_key.as_bytes(), profile_bytes)?;
    tx_events.insert(event_key.as_bytes(), event_bytes)?;

    Ok(XpBalance {
        previous_total,
        xp_total: profile.xp_total,
        previous_level,
        current_level: profile.current_level,
    })
}

impl Store {
    fn scan_xp_range(
        &self,
        student_id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<XpEvent>, StoreError> {
        let prefix = keys::xp_event_prefix(student_id)?;
        let lower = match start {
            Some(start) => keys::xp_event_bound(student_id, start.timestamp_millis())?,
            None => prefix.clone(),
        };
        let mut out = Vec::new();
        for item in self.xp_events.range(lower.as_bytes()..) {
            let (key, raw) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let event: XpEvent = match Self::deserialize(&raw) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, student_id, "Skipping malformed XP event");
                    continue;
                }
            };
            if let Some(end) = end {
                if event.date >= end {
                    break;
                }
            }
            out.push(event);
        }
        Ok(out)
    }
}

impl XpLedger for Store {
    fn append_xp_event(&self, event: &XpEvent, xp_per_level: u64) -> Result<XpBalance, StoreError> {
        let event_key = keys::xp_event_key(&event.student_id, event.date.timestamp_millis(), &event.id)?;
        let event_bytes = Self::serialize(event)?;

        (&self.xp_events, &self.students)
            .transaction(|(tx_events, tx_students)| {
                apply_xp_in_tx(
                    tx_events,
                    tx_students,
                    &event_key,
                    &event_bytes,
                    event,
                    xp_per_level,
                )
            })
            .map_err(flatten_tx_error)
    }

    fn xp_sum_between(
        &self,
        student_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Ok(self
            .scan_xp_range(student_id, Some(start), Some(end))?
            .iter()
            .map(|e| e.xp_amount)
            .sum())
    }

    fn has_xp_between(
        &self,
        student_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(!self
            .scan_xp_range(student_id, Some(start), Some(end))?
            .is_empty())
    }

    fn xp_events_for(&self, student_id: &str) -> Result<Vec<XpEvent>, StoreError> {
        self.scan_xp_range(student_id, None, None)
    }

    fn ledger_total(&self, student_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .scan_xp_range(student_id, None, None)?
            .iter()
            .map(|e| e.xp_amount)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::lex::ports::StudentRepository;
    use crate::store::test_support::temp_store;

    fn event(id: &str, student_id: &str, amount: u64, date: DateTime<Utc>) -> XpEvent {
        XpEvent {
            id: id.to_string(),
            student_id: student_id.to_string(),
            action: XpAction::LessonCompleted,
            xp_amount: amount,
            date,
            trigger: "test".to_string(),
        }
    }

    #[test]
    fn append_updates_total_and_level() {
        let (_dir, store) = temp_store();
        store
            .create_student(&StudentProfile::new("s1", "Ada", Utc::now()))
            .unwrap();
        store
            .append_xp_event(&event("e1", "s1", 195, Utc::now()), 200)
            .unwrap();
        let balance = store
            .append_xp_event(&event("e2", "s1", 10, Utc::now()), 200)
            .unwrap();

        assert_eq!(balance.previous_total, 195);
        assert_eq!(balance.xp_total, 205);
        assert_eq!(balance.previous_level, 1);
        assert_eq!(balance.current_level, 2);
        assert!(balance.leveled_up());
    }

    #[test]
    fn append_for_unknown_student_writes_nothing() {
        let (_dir, store) = temp_store();
        let err = store
            .append_xp_event(&event("e1", "ghost", 10, Utc::now()), 200)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.xp_events_for("ghost").unwrap().is_empty());
    }

    #[test]
    fn window_sum_is_half_open() {
        let (_dir, store) = temp_store();
        let now = Utc::now();
        store
            .create_student(&StudentProfile::new("s1", "Ada", now))
            .unwrap();
        store
            .append_xp_event(&event("old", "s1", 5, now - Duration::days(8)), 200)
            .unwrap();
        store
            .append_xp_event(&event("start", "s1", 7, now - Duration::days(7)), 200)
            .unwrap();
        store
            .append_xp_event(&event("mid", "s1", 11, now - Duration::days(1)), 200)
            .unwrap();
        store
            .append_xp_event(&event("end", "s1", 13, now), 200)
            .unwrap();

        let sum = store
            .xp_sum_between("s1", now - Duration::days(7), now)
            .unwrap();
        assert_eq!(sum, 18);
        assert_eq!(store.xp_events_for("s1").unwrap().len(), 4);
    }
}
