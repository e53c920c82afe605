use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lex::ports::QuestionRepository;
use crate::store::keys;
use crate::store::{Store, StoreError};

pub const MIN_GRADE_RATING: u8 = 10;
pub const MAX_GRADE_RATING: u8 = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    pub topic: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub grade_rating: u8,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub video_solution_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.topic.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "question {} has an empty topic",
                self.id
            )));
        }
        if self.subject.trim().is_empty() {
            return Err(StoreError::Validation(format!(
                "question {} has an empty subject",
                self.id
            )));
        }
        if !(MIN_GRADE_RATING..=MAX_GRADE_RATING).contains(&self.grade_rating) {
            return Err(StoreError::Validation(format!(
                "question {} gradeRating must be within {MIN_GRADE_RATING}..={MAX_GRADE_RATING}",
                self.id
            )));
        }
        Ok(())
    }

    /// Answers compare trimmed and case-insensitively.
    pub fn is_correct_answer(&self, answer: &str) -> bool {
        self.correct_answer.trim().eq_ignore_ascii_case(answer.trim())
    }
}

impl QuestionRepository for Store {
    fn get_question(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        let key = keys::question_key(question_id)?;
        match self.questions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let mut questions = Vec::new();
        for item in self.questions.iter() {
            let (key, raw) = item?;
            match Self::deserialize::<Question>(&raw) {
                Ok(question) => questions.push(question),
                Err(e) => tracing::warn!(
                    error = %e,
                    key = %String::from_utf8_lossy(&key),
                    "Skipping malformed question"
                ),
            }
        }
        Ok(questions)
    }

    fn list_questions_by_topic(&self, topic: &str) -> Result<Vec<Question>, StoreError> {
        let prefix = keys::question_topic_prefix(topic)?;
        let mut questions = Vec::new();
        for item in self.questions_by_topic.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let Some(question_id) = key
                .get(prefix.len()..)
                .and_then(|tail| std::str::from_utf8(tail).ok())
            else {
                continue;
            };
            if let Some(question) = self.get_question(question_id)? {
                questions.push(question);
            }
        }
        Ok(questions)
    }

    fn upsert_question(&self, question: &Question) -> Result<(), StoreError> {
        question.validate()?;
        let key = keys::question_key(&question.id)?;
        let index_key = keys::question_topic_index_key(&question.topic, &question.id)?;

        // Topic changes must drop the old index entry.
        if let Some(previous) = self.get_question(&question.id)? {
            if previous.topic != question.topic {
                let old_index = keys::question_topic_index_key(&previous.topic, &previous.id)?;
                self.questions_by_topic.remove(old_index.as_bytes())?;
            }
        }

        self.questions
            .insert(key.as_bytes(), Self::serialize(question)?)?;
        self.questions_by_topic.insert(index_key.as_bytes(), &[])?;
        Ok(())
    }
}

impl Store {
    pub fn count_questions(&self) -> usize {
        self.questions.len()
    }
}

#[cfg(test)]
pub(crate) fn sample_question(id: &str, topic: &str, difficulty: Difficulty, grade: u8) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}"),
        options: vec!["a".to_string(), "b".to_string()],
        correct_answer: "a".to_string(),
        topic: topic.to_string(),
        subject: "Mathematics".to_string(),
        difficulty,
        grade_rating: grade,
        explanation: None,
        hint: None,
        video_solution_url: None,
        created_at: Utc::now(),
    }
}
