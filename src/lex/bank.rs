use std::collections::{BTreeMap, HashMap};

use crate::lex::ports::QuestionRepository;
use crate::store::operations::questions::Question;
use crate::store::StoreError;

/// Read-only snapshot of the question bank, indexed by id and by topic.
///
/// Built per request from the repository; topic lists keep the repository's
/// ordering so seeded selections are reproducible.
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
    by_id: HashMap<String, usize>,
    by_topic: BTreeMap<String, Vec<usize>>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        let mut by_id = HashMap::with_capacity(questions.len());
        let mut by_topic: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, q) in questions.iter().enumerate() {
            by_id.insert(q.id.clone(), idx);
            by_topic.entry(q.topic.clone()).or_default().push(idx);
        }
        Self {
            questions,
            by_id,
            by_topic,
        }
    }

    pub fn load<R>(repo: &R) -> Result<Self, StoreError>
    where
        R: QuestionRepository + ?Sized,
    {
        Ok(Self::new(repo.list_questions()?))
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, question_id: &str) -> Option<&Question> {
        self.by_id.get(question_id).map(|&idx| &self.questions[idx])
    }

    pub fn topic_of(&self, question_id: &str) -> Option<&str> {
        self.get(question_id).map(|q| q.topic.as_str())
    }

    pub fn all(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn in_topic<'a>(&'a self, topic: &str) -> impl Iterator<Item = &'a Question> + 'a {
        self.by_topic
            .get(topic)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.questions[idx])
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.by_topic.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::operations::questions::{sample_question, Difficulty};

    #[test]
    fn indexes_by_topic_and_id() {
        let bank = QuestionBank::new(vec![
            sample_question("q1", "fractions", Difficulty::Easy, 20),
            sample_question("q2", "algebra", Difficulty::Hard, 70),
            sample_question("q3", "fractions", Difficulty::Medium, 40),
        ]);
        assert_eq!(bank.len(), 3);
        assert_eq!(bank.topic_of("q2"), Some("algebra"));
        let ids: Vec<_> = bank.in_topic("fractions").map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["q1", "q3"]);
        assert_eq!(bank.in_topic("geometry").count(), 0);
        assert_eq!(bank.topics().collect::<Vec<_>>(), vec!["algebra", "fractions"]);
    }
}
