use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::lex::ports::StudentRepository;
use crate::lex::xp::level_for_xp;
use crate::store::keys;
use crate::store::{abort, Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub weak_topics: BTreeSet<String>,
    #[serde(default)]
    pub strong_topics: BTreeSet<String>,
    #[serde(default)]
    pub recent_topics: BTreeSet<String>,
    #[serde(default)]
    pub xp_total: u64,
    /// Always `level_for_xp(xp_total)`; only written through [`StudentProfile::set_xp_total`].
    #[serde(default = "first_level")]
    pub current_level: u32,
    #[serde(default)]
    pub current_working_average: f64,
    #[serde(default)]
    pub study_streak: u32,
    /// Day the streak was last advanced, so a repeated daily run is a no-op.
    #[serde(default)]
    pub streak_updated_on: Option<NaiveDate>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_study_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn first_level() -> u32 {
    1
}

impl StudentProfile {
    pub fn new(id: &str, display_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            parent_id: None,
            weak_topics: BTreeSet::new(),
            strong_topics: BTreeSet::new(),
            recent_topics: BTreeSet::new(),
            xp_total: 0,
            current_level: 1,
            current_working_average: 0.0,
            study_streak: 0,
            streak_updated_on: None,
            last_login: None,
            last_study_date: None,
            created_at: now,
        }
    }

    pub fn set_xp_total(&mut self, xp_total: u64, xp_per_level: u64) {
        self.xp_total = xp_total;
        self.current_level = level_for_xp(xp_total, xp_per_level);
    }

    /// Most recent sign of life; falls back to account creation.
    pub fn last_activity(&self) -> DateTime<Utc> {
        [self.last_login, self.last_study_date]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or(self.created_at)
    }
}

impl StudentRepository for Store {
    fn get_student(&self, student_id: &str) -> Result<Option<StudentProfile>, StoreError> {
        let key = keys::student_key(student_id)?;
        match self.students.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn list_student_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for item in self.students.iter() {
            let (key, _) = item?;
            match String::from_utf8(key.to_vec()) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(error = %e, "Invalid UTF-8 in student key"),
            }
        }
        Ok(ids)
    }

    fn create_student(&self, profile: &StudentProfile) -> Result<(), StoreError> {
        let key = keys::student_key(&profile.id)?;
        let bytes = Self::serialize(profile)?;
        let cas = self
            .students
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))?;
        if cas.is_err() {
            return Err(StoreError::conflict("student", &profile.id));
        }
        Ok(())
    }

    fn update_student(
        &self,
        student_id: &str,
        apply: &dyn Fn(&mut StudentProfile),
    ) -> Result<StudentProfile, StoreError> {
        let key = keys::student_key(student_id)?;
        self.students
            .transaction(|tx| {
                let Some(raw) = tx.get(key.as_bytes())? else {
                    return abort(StoreError::not_found("student", student_id));
                };
                let mut profile: StudentProfile = match Self::deserialize(&raw) {
                    Ok(p) => p,
                    Err(e) => return abort(e),
                };
                apply(&mut profile);
                let bytes = match Self::serialize(&profile) {
                    Ok(b) => b,
                    Err(e) => return abort(e),
                };
                tx.insert(key.as_bytes(), bytes)?;
                Ok(profile)
            })
            .map_err(crate::store::flatten_tx_error)
    }
}
