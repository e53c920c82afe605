//! Folding a finished session back into the student's topic sets.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lex::config::MasteryConfig;
use crate::lex::error::EngineError;
use crate::lex::ports::StudentRepository;
use crate::store::operations::attempts::QuestionAttempt;
use crate::store::operations::questions::Question;
use crate::store::operations::students::StudentProfile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicTally {
    pub correct: usize,
    pub total: usize,
}

impl TopicTally {
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.correct as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSets {
    pub weak_topics: BTreeSet<String>,
    pub strong_topics: BTreeSet<String>,
    pub recent_topics: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(flatten)]
    pub topics: TopicSets,
    pub last_study_date: DateTime<Utc>,
}

/// Decides the new weak/strong/recent sets from this session's per-topic
/// tallies. Kept behind a trait so the policy can change without touching
/// selection.
pub trait TopicClassifier: Send + Sync {
    fn classify(
        &self,
        previous: &StudentProfile,
        session: &BTreeMap<String, TopicTally>,
        config: &MasteryConfig,
    ) -> TopicSets;
}

/// Replace all three sets with what this session alone shows. Topics not
/// touched this session drop out.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplacePerSession;

impl TopicClassifier for ReplacePerSession {
    fn classify(
        &self,
        _previous: &StudentProfile,
        session: &BTreeMap<String, TopicTally>,
        config: &MasteryConfig,
    ) -> TopicSets {
        let mut sets = TopicSets::default();
        for (topic, tally) in session {
            if tally.total == 0 {
                continue;
            }
            let accuracy = tally.accuracy();
            if accuracy < config.weak_below {
                sets.weak_topics.insert(topic.clone());
            } else if accuracy > config.strong_above {
                sets.strong_topics.insert(topic.clone());
            }
            sets.recent_topics.insert(topic.clone());
        }
        sets
    }
}

/// Group session attempts by the topic of their question. Attempts whose
/// question is not part of the session are ignored.
pub fn session_tallies(
    questions: &[Question],
    attempts: &[QuestionAttempt],
) -> BTreeMap<String, TopicTally> {
    let topics: HashMap<&str, &str> = questions
        .iter()
        .map(|q| (q.id.as_str(), q.topic.as_str()))
        .collect();
    let mut tallies: BTreeMap<String, TopicTally> = BTreeMap::new();
    for attempt in attempts {
        let Some(topic) = topics.get(attempt.question_id.as_str()) else {
            tracing::debug!(
                question_id = %attempt.question_id,
                "Attempt does not belong to the session, ignored"
            );
            continue;
        };
        let tally = tallies.entry((*topic).to_string()).or_default();
        tally.total += 1;
        if attempt.correct {
            tally.correct += 1;
        }
    }
    tallies
}

pub fn update_profile<R>(
    repo: &R,
    classifier: &dyn TopicClassifier,
    student_id: &str,
    session_questions: &[Question],
    session_attempts: &[QuestionAttempt],
    config: &MasteryConfig,
    now: DateTime<Utc>,
) -> Result<ProfileUpdate, EngineError>
where
    R: StudentRepository + ?Sized,
{
    let previous = repo
        .get_student(student_id)?
        .ok_or_else(|| EngineError::not_found("student", student_id))?;
    let tallies = session_tallies(session_questions, session_attempts);
    let topics = classifier.classify(&previous, &tallies, config);

    repo.update_student(student_id, &|profile| {
        profile.weak_topics = topics.weak_topics.clone();
        profile.strong_topics = topics.strong_topics.clone();
        profile.recent_topics = topics.recent_topics.clone();
        profile.last_study_date = Some(now);
    })?;

    tracing::debug!(
        student_id,
        weak = topics.weak_topics.len(),
        strong = topics.strong_topics.len(),
        recent = topics.recent_topics.len(),
        "Profile topics replaced"
    );
    Ok(ProfileUpdate {
        topics,
        last_study_date: now,
    })
}
