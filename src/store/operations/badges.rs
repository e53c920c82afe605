use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::lex::ports::BadgeRepository;
use crate::store::keys;
use crate::store::operations::xp_events::{apply_xp_in_tx, XpBalance, XpEvent};
use crate::store::{abort, flatten_tx_error, Store, StoreError};

/// Named criterion a badge is evaluated against. Parameters live with the
/// rule so the catalog stays data, not code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BadgeRule {
    /// Completed lessons in `subject` and subject-scoped attempt accuracy.
    SubjectMastery {
        subject: String,
        min_lessons: usize,
        /// Percentage, 0-100.
        min_accuracy: f64,
    },
    /// At least `min_attempts` attempts answered in under `max_seconds`.
    QuickAnswers { max_seconds: u32, min_attempts: usize },
    StudyStreak { min_days: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub xp_reward: u64,
    pub criteria: BadgeRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentBadge {
    pub student_id: String,
    pub badge_id: String,
    pub date_earned: DateTime<Utc>,
}

impl BadgeRepository for Store {
    fn list_badges(&self) -> Result<Vec<Badge>, StoreError> {
        let mut badges = Vec::new();
        for item in self.badges.iter() {
            let (_, raw) = item?;
            match Self::deserialize::<Badge>(&raw) {
                Ok(badge) => badges.push(badge),
                Err(e) => tracing::warn!(error = %e, "Skipping malformed badge definition"),
            }
        }
        Ok(badges)
    }

    fn get_badge(&self, badge_id: &str) -> Result<Option<Badge>, StoreError> {
        let key = keys::badge_key(badge_id)?;
        match self.badges.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn upsert_badge(&self, badge: &Badge) -> Result<(), StoreError> {
        let key = keys::badge_key(&badge.id)?;
        self.badges.insert(key.as_bytes(), Self::serialize(badge)?)?;
        Ok(())
    }

    fn student_badges(&self, student_id: &str) -> Result<Vec<StudentBadge>, StoreError> {
        let prefix = keys::student_badge_prefix(student_id)?;
        let mut out = Vec::new();
        for item in self.student_badges.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            out.push(Self::deserialize::<StudentBadge>(&raw)?);
        }
        Ok(out)
    }

    fn award_badge_atomically(
        &self,
        award: &StudentBadge,
        grant: &XpEvent,
        xp_per_level: u64,
    ) -> Result<XpBalance, StoreError> {
        let award_key = keys::student_badge_key(&award.student_id, &award.badge_id)?;
        let award_bytes = Self::serialize(award)?;
        let event_key =
            keys::xp_event_key(&grant.student_id, grant.date.timestamp_millis(), &grant.id)?;
        let event_bytes = Self::serialize(grant)?;

        (&self.student_badges, &self.xp_events, &self.students)
            .transaction(|(tx_awards, tx_events, tx_students)| {
                if tx_awards.get(award_key.as_bytes())?.is_some() {
                    return abort(StoreError::Conflict {
                        entity: "student_badge".to_string(),
                        key: award_key.clone(),
                    });
                }
                tx_awards.insert(award_key.as_bytes(), award_bytes.as_slice())?;
                apply_xp_in_tx(
                    tx_events,
                    tx_students,
                    &event_key,
                    &event_bytes,
                    grant,
                    xp_per_level,
                )
            })
            .map_err(flatten_tx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_serializes_with_tag() {
        let rule = BadgeRule::StudyStreak { min_days: 7 };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["rule"], "study_streak");
        assert_eq!(json["min_days"], 7);
    }
}
