use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lex::ports::CourseworkRepository;
use crate::store::keys;
use crate::store::{Store, StoreError};

/// Admin-registered lesson. Completion counts toward its `subject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletion {
    pub student_id: String,
    pub lesson_id: String,
    pub subject: String,
    pub completed_at: DateTime<Utc>,
}

/// `not_started -> in_progress -> completed`, or `not_started|in_progress -> overdue`.
/// `completed` and `overdue` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    InProgress,
    Completed,
    Overdue,
}

impl CompletionStatus {
    pub fn can_transition_to(self, next: CompletionStatus) -> bool {
        use CompletionStatus::*;
        matches!(
            (self, next),
            (NotStarted, InProgress)
                | (InProgress, Completed)
                | (NotStarted, Overdue)
                | (InProgress, Overdue)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Overdue)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkAssignment {
    pub id: String,
    pub student_id: String,
    pub title: String,
    pub subject: String,
    pub due_date: DateTime<Utc>,
    pub completion_status: CompletionStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CourseworkRepository for Store {
    fn create_lesson(&self, lesson: &Lesson) -> Result<(), StoreError> {
        let key = keys::lesson_key(&lesson.id)?;
        let cas = self.lessons.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(lesson)?),
        )?;
        if cas.is_err() {
            return Err(StoreError::conflict("lesson", &lesson.id));
        }
        Ok(())
    }

    fn get_lesson(&self, lesson_id: &str) -> Result<Option<Lesson>, StoreError> {
        let key = keys::lesson_key(lesson_id)?;
        match self.lessons.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn record_lesson_completion(&self, completion: &LessonCompletion) -> Result<bool, StoreError> {
        let key = keys::lesson_completion_key(&completion.student_id, &completion.lesson_id)?;
        let cas = self.lesson_completions.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(completion)?),
        )?;
        Ok(cas.is_ok())
    }

    fn lesson_completions(&self, student_id: &str) -> Result<Vec<LessonCompletion>, StoreError> {
        let prefix = keys::lesson_completion_prefix(student_id)?;
        let mut out = Vec::new();
        for item in self.lesson_completions.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            out.push(Self::deserialize::<LessonCompletion>(&raw)?);
        }
        Ok(out)
    }

    fn create_homework(&self, assignment: &HomeworkAssignment) -> Result<(), StoreError> {
        let key = keys::homework_key(&assignment.student_id, &assignment.id)?;
        let cas = self.homework.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(assignment)?),
        )?;
        if cas.is_err() {
            return Err(StoreError::conflict("homework", &assignment.id));
        }
        Ok(())
    }

    fn get_homework(
        &self,
        student_id: &str,
        homework_id: &str,
    ) -> Result<Option<HomeworkAssignment>, StoreError> {
        let key = keys::homework_key(student_id, homework_id)?;
        match self.homework.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_homework(&self, assignment: &HomeworkAssignment) -> Result<(), StoreError> {
        let key = keys::homework_key(&assignment.student_id, &assignment.id)?;
        self.homework
            .insert(key.as_bytes(), Self::serialize(assignment)?)?;
        Ok(())
    }

    fn list_homework(&self, student_id: &str) -> Result<Vec<HomeworkAssignment>, StoreError> {
        let prefix = keys::homework_prefix(student_id)?;
        let mut out = Vec::new();
        for item in self.homework.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            out.push(Self::deserialize::<HomeworkAssignment>(&raw)?);
        }
        out.sort_by(|a, b| a.due_date.cmp(&b.due_date));
        Ok(out)
    }
}
