//! Badge catalog, eligibility and awarding.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::lex::bank::QuestionBank;
use crate::lex::config::XpConfig;
use crate::lex::error::EngineError;
use crate::lex::mastery::subject_accuracy;
use crate::lex::ports::{AttemptRepository, BadgeRepository, CourseworkRepository, StudentRepository};
use crate::store::operations::attempts::QuestionAttempt;
use crate::store::operations::badges::{Badge, BadgeRule, StudentBadge};
use crate::store::operations::coursework::LessonCompletion;
use crate::store::operations::students::StudentProfile;
use crate::store::operations::xp_events::{XpAction, XpBalance, XpEvent};

pub fn default_catalog() -> Vec<Badge> {
    vec![
        Badge {
            id: "math_master".to_string(),
            name: "Math Master".to_string(),
            description: "Complete 15 Mathematics lessons with at least 90% accuracy".to_string(),
            xp_reward: 100,
            criteria: BadgeRule::SubjectMastery {
                subject: "Mathematics".to_string(),
                min_lessons: 15,
                min_accuracy: 90.0,
            },
        },
        Badge {
            id: "speed_demon".to_string(),
            name: "Speed Demon".to_string(),
            description: "Answer 10 questions in under 30 seconds each".to_string(),
            xp_reward: 50,
            criteria: BadgeRule::QuickAnswers {
                max_seconds: 30,
                min_attempts: 10,
            },
        },
        Badge {
            id: "consistent_learner".to_string(),
            name: "Consistent Learner".to_string(),
            description: "Keep a 7-day study streak".to_string(),
            xp_reward: 75,
            criteria: BadgeRule::StudyStreak { min_days: 7 },
        },
    ]
}

/// Fresh aggregates a rule is evaluated against.
pub struct BadgeFacts<'a> {
    pub profile: &'a StudentProfile,
    pub attempts: &'a [QuestionAttempt],
    pub lessons: &'a [LessonCompletion],
    pub bank: &'a QuestionBank,
}

pub fn rule_satisfied(rule: &BadgeRule, facts: &BadgeFacts<'_>) -> bool {
    match rule {
        BadgeRule::SubjectMastery {
            subject,
            min_lessons,
            min_accuracy,
        } => {
            let lessons = facts.lessons.iter().filter(|l| &l.subject == subject).count();
            lessons >= *min_lessons && subject_accuracy(facts.attempts, facts.bank, subject) >= *min_accuracy
        }
        BadgeRule::QuickAnswers {
            max_seconds,
            min_attempts,
        } => {
            let quick = facts
                .attempts
                .iter()
                .filter(|a| a.time_taken < *max_seconds)
                .count();
            quick >= *min_attempts
        }
        BadgeRule::StudyStreak { min_days } => facts.profile.study_streak >= *min_days,
    }
}

/// Badges the student now qualifies for and does not hold yet.
pub fn check_eligibility<R>(
    repo: &R,
    bank: &QuestionBank,
    student_id: &str,
) -> Result<Vec<String>, EngineError>
where
    R: StudentRepository + AttemptRepository + CourseworkRepository + BadgeRepository + ?Sized,
{
    let profile = repo
        .get_student(student_id)?
        .ok_or_else(|| EngineError::not_found("student", student_id))?;
    let held: HashSet<String> = repo
        .student_badges(student_id)?
        .into_iter()
        .map(|b| b.badge_id)
        .collect();
    let pending: Vec<Badge> = repo
        .list_badges()?
        .into_iter()
        .filter(|b| !held.contains(&b.id))
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let attempts = repo.all_attempts(student_id)?;
    let lessons = repo.lesson_completions(student_id)?;
    let facts = BadgeFacts {
        profile: &profile,
        attempts: &attempts,
        lessons: &lessons,
        bank,
    };

    Ok(pending
        .into_iter()
        .filter(|b| rule_satisfied(&b.criteria, &facts))
        .map(|b| b.id)
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeAward {
    pub badge_id: String,
    pub xp_awarded: u64,
    pub balance: XpBalance,
}

/// Award one badge: the badge row, its XP event and the student's new totals
/// are written together or not at all. A second award of the same pair is a
/// `Conflict`.
pub fn award_badge<R>(
    repo: &R,
    config: &XpConfig,
    student_id: &str,
    badge_id: &str,
    now: DateTime<Utc>,
) -> Result<BadgeAward, EngineError>
where
    R: BadgeRepository + ?Sized,
{
    let badge = repo
        .get_badge(badge_id)?
        .ok_or_else(|| EngineError::not_found("badge", badge_id))?;

    let award = StudentBadge {
        student_id: student_id.to_string(),
        badge_id: badge.id.clone(),
        date_earned: now,
    };
    let grant = XpEvent {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        action: XpAction::BadgeEarned,
        xp_amount: badge.xp_reward,
        date: now,
        trigger: format!("badge_{}", badge.id),
    };
    let balance = repo.award_badge_atomically(&award, &grant, config.xp_per_level)?;

    tracing::info!(student_id, badge_id, xp = badge.xp_reward, "Badge awarded");
    Ok(BadgeAward {
        badge_id: badge.id,
        xp_awarded: badge.xp_reward,
        balance,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::lex::ports::{AttemptRepository, XpLedger};
    use crate::store::operations::attempts::sample_attempt;
    use crate::store::operations::questions::{sample_question, Difficulty};
    use crate::store::test_support::temp_store;

    fn student(store: &crate::store::Store, id: &str) {
        store
            .create_student(&StudentProfile::new(id, "Student", Utc::now()))
            .unwrap();
    }

    #[test]
    fn second_award_conflicts_and_grants_once() {
        let (_dir, store) = temp_store();
        student(&store, "s1");
        let cfg = XpConfig::default();

        let first = award_badge(&store, &cfg, "s1", "speed_demon", Utc::now()).unwrap();
        assert_eq!(first.xp_awarded, 50);
        let err = award_badge(&store, &cfg, "s1", "speed_demon", Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));

        let profile = store.get_student("s1").unwrap().unwrap();
        assert_eq!(profile.xp_total, 50);
        let events = store.xp_events_for("s1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].trigger, "badge_speed_demon");
        assert_eq!(events[0].action, XpAction::BadgeEarned);
    }

    #[test]
    fn award_to_unknown_student_leaves_nothing() {
        let (_dir, store) = temp_store();
        let err = award_badge(&store, &XpConfig::default(), "ghost", "speed_demon", Utc::now())
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(store.student_badges("ghost").unwrap().is_empty());
        assert!(store.xp_events_for("ghost").unwrap().is_empty());
    }

    #[test]
    fn unknown_badge_is_not_found() {
        let (_dir, store) = temp_store();
        student(&store, "s1");
        let err = award_badge(&store, &XpConfig::default(), "s1", "nope", Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[test]
    fn eligibility_reflects_fresh_aggregates() {
        let (_dir, store) = temp_store();
        student(&store, "s1");
        let bank = QuestionBank::new(vec![sample_question("q1", "algebra", Difficulty::Easy, 20)]);
        let now = Utc::now();
        for i in 0..10 {
            let mut attempt =
                sample_attempt(&format!("a{i}"), "s1", "q1", true, now - Duration::minutes(i));
            attempt.time_taken = 12;
            store.append_attempt(&attempt).unwrap();
        }
        store
            .update_student("s1", &|p| p.study_streak = 7)
            .unwrap();

        let mut eligible = check_eligibility(&store, &bank, "s1").unwrap();
        eligible.sort();
        assert_eq!(eligible, vec!["consistent_learner", "speed_demon"]);

        award_badge(&store, &XpConfig::default(), "s1", "speed_demon", now).unwrap();
        assert_eq!(check_eligibility(&store, &bank, "s1").unwrap(), vec!["consistent_learner"]);
    }

    #[test]
    fn subject_mastery_needs_lessons_and_accuracy() {
        let bank = QuestionBank::new(vec![sample_question("q1", "algebra", Difficulty::Easy, 20)]);
        let now = Utc::now();
        let profile = StudentProfile::new("s1", "Sam", now);
        let attempts: Vec<_> = (0..10)
            .map(|i| sample_attempt(&format!("a{i}"), "s1", "q1", i != 0, now))
            .collect();
        let lessons: Vec<_> = (0..15)
            .map(|i| LessonCompletion {
                student_id: "s1".to_string(),
                lesson_id: format!("l{i}"),
                subject: "Mathematics".to_string(),
                completed_at: now,
            })
            .collect();
        let rule = default_catalog().remove(0).criteria;

        let facts = BadgeFacts {
            profile: &profile,
            attempts: &attempts,
            lessons: &lessons,
            bank: &bank,
        };
        assert!(rule_satisfied(&rule, &facts));

        let facts = BadgeFacts {
            lessons: &lessons[..14],
            ..facts
        };
        assert!(!rule_satisfied(&rule, &facts));
    }
}
