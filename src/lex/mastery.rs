//! Accuracy aggregates over attempt history: the current working average and
//! per-topic / per-subject mastery.

use serde::Serialize;

use crate::lex::bank::QuestionBank;
use crate::lex::ports::AttemptRepository;
use crate::store::operations::attempts::QuestionAttempt;
use crate::store::operations::questions::Question;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMastery {
    pub topic: String,
    pub attempts: usize,
    pub correct: usize,
    /// Percentage, 0-100.
    pub mastery: f64,
}

fn percent(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * correct as f64 / total as f64
}

/// Current working average: percentage correct over the `window` most recent
/// attempts by date. Zero for an empty history.
pub fn cwa(attempts: &[QuestionAttempt], window: usize) -> f64 {
    let mut ordered: Vec<&QuestionAttempt> = attempts.iter().collect();
    ordered.sort_by(|a, b| b.attempt_date.cmp(&a.attempt_date));
    let recent = &ordered[..ordered.len().min(window)];
    let correct = recent.iter().filter(|a| a.correct).count();
    percent(correct, recent.len())
}

fn matching<F>(attempts: &[QuestionAttempt], bank: &QuestionBank, mut keep: F) -> (usize, usize)
where
    F: FnMut(&Question) -> bool,
{
    let mut total = 0;
    let mut correct = 0;
    for attempt in attempts {
        // attempts against deleted questions carry no topic; they are ignored
        let Some(question) = bank.get(&attempt.question_id) else {
            continue;
        };
        if keep(question) {
            total += 1;
            if attempt.correct {
                correct += 1;
            }
        }
    }
    (correct, total)
}

/// Mastery over the student's full history in one topic.
pub fn topic_mastery(attempts: &[QuestionAttempt], bank: &QuestionBank, topic: &str) -> TopicMastery {
    let (correct, total) = matching(attempts, bank, |q| q.topic == topic);
    TopicMastery {
        topic: topic.to_string(),
        attempts: total,
        correct,
        mastery: percent(correct, total),
    }
}

/// Attempt accuracy restricted to questions of one subject, 0-100.
pub fn subject_accuracy(attempts: &[QuestionAttempt], bank: &QuestionBank, subject: &str) -> f64 {
    let (correct, total) = matching(attempts, bank, |q| q.subject == subject);
    percent(correct, total)
}

/// CWA straight from the attempt log; only the newest `window` rows are read.
pub fn student_cwa<R>(repo: &R, student_id: &str, window: usize) -> Result<f64, StoreError>
where
    R: AttemptRepository + ?Sized,
{
    let recent = repo.recent_attempts(student_id, window)?;
    Ok(cwa(&recent, window))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::store::operations::attempts::sample_attempt;
    use crate::store::operations::questions::{sample_question, Difficulty};

    fn history(pattern: &[bool]) -> Vec<QuestionAttempt> {
        let now = Utc::now();
        pattern
            .iter()
            .enumerate()
            .map(|(i, &ok)| {
                sample_attempt(&format!("a{i}"), "s1", "q1", ok, now - Duration::minutes(i as i64))
            })
            .collect()
    }

    #[test]
    fn seven_of_ten_is_seventy() {
        let mut pattern = vec![true; 7];
        pattern.extend([false; 3]);
        assert_eq!(cwa(&history(&pattern), 50), 70.0);
    }

    #[test]
    fn empty_history_is_zero() {
        assert_eq!(cwa(&[], 50), 0.0);
    }

    #[test]
    fn only_newest_window_counts() {
        // 50 newest correct, 20 older incorrect
        let mut pattern = vec![true; 50];
        pattern.extend([false; 20]);
        let mut attempts = history(&pattern);
        attempts.reverse();
        assert_eq!(cwa(&attempts, 50), 100.0);
    }

    #[test]
    fn topic_and_subject_scoping() {
        let mut physics = sample_question("q3", "forces", Difficulty::Easy, 30);
        physics.subject = "Physics".to_string();
        let bank = QuestionBank::new(vec![
            sample_question("q1", "fractions", Difficulty::Easy, 20),
            sample_question("q2", "algebra", Difficulty::Easy, 20),
            physics,
        ]);
        let now = Utc::now();
        let attempts = vec![
            sample_attempt("a1", "s1", "q1", true, now),
            sample_attempt("a2", "s1", "q1", false, now),
            sample_attempt("a3", "s1", "q2", true, now),
            sample_attempt("a4", "s1", "q3", false, now),
            sample_attempt("a5", "s1", "gone", true, now),
        ];

        let fractions = topic_mastery(&attempts, &bank, "fractions");
        assert_eq!(fractions.attempts, 2);
        assert_eq!(fractions.mastery, 50.0);
        assert_eq!(topic_mastery(&attempts, &bank, "geometry").mastery, 0.0);

        let maths = subject_accuracy(&attempts, &bank, "Mathematics");
        assert!((maths - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(subject_accuracy(&attempts, &bank, "Physics"), 0.0);
    }
}
