//! Demo data for local development. Called explicitly by the binary when
//! `SEED_DEMO_DATA=true`; safe to run on every start.

use chrono::{Duration, Utc};

use crate::lex::ports::{CourseworkRepository, QuestionRepository, StudentRepository};
use crate::store::operations::coursework::{CompletionStatus, HomeworkAssignment, Lesson};
use crate::store::operations::questions::{Difficulty, Question};
use crate::store::operations::students::StudentProfile;
use crate::store::{Store, StoreError};

pub const DEMO_STUDENT_ID: &str = "demo-student";
const DEMO_HOMEWORK_ID: &str = "demo-homework-fractions";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub students_created: usize,
    pub questions_created: usize,
    pub lessons_created: usize,
    pub homework_created: usize,
}

struct DemoQuestion {
    id: &'static str,
    text: &'static str,
    options: &'static [&'static str],
    answer: &'static str,
    topic: &'static str,
    subject: &'static str,
    difficulty: Difficulty,
    rating: u8,
}

#[rustfmt::skip]
const DEMO_QUESTIONS: &[DemoQuestion] = &[
    DemoQuestion { id: "demo-frac-1", text: "What is 1/2 + 1/4?", options: &["3/4", "2/6", "1/6"], answer: "3/4", topic: "Fractions", subject: "Mathematics", difficulty: Difficulty::Easy, rating: 20 },
    DemoQuestion { id: "demo-frac-2", text: "Simplify 6/8.", options: &["3/4", "2/3", "6/8"], answer: "3/4", topic: "Fractions", subject: "Mathematics", difficulty: Difficulty::Easy, rating: 30 },
    DemoQuestion { id: "demo-frac-3", text: "What is 2/3 of 27?", options: &["18", "9", "12"], answer: "18", topic: "Fractions", subject: "Mathematics", difficulty: Difficulty::Medium, rating: 50 },
    DemoQuestion { id: "demo-frac-4", text: "What is 5/6 - 3/4?", options: &["1/12", "1/6", "2/2"], answer: "1/12", topic: "Fractions", subject: "Mathematics", difficulty: Difficulty::Hard, rating: 75 },
    DemoQuestion { id: "demo-alg-1", text: "Solve x + 3 = 7.", options: &["4", "10", "3"], answer: "4", topic: "Algebra", subject: "Mathematics", difficulty: Difficulty::Easy, rating: 25 },
    DemoQuestion { id: "demo-alg-2", text: "Solve 3x = 21.", options: &["7", "18", "63"], answer: "7", topic: "Algebra", subject: "Mathematics", difficulty: Difficulty::Medium, rating: 45 },
    DemoQuestion { id: "demo-alg-3", text: "Solve 2x - 5 = 3x + 1.", options: &["-6", "6", "-4"], answer: "-6", topic: "Algebra", subject: "Mathematics", difficulty: Difficulty::Hard, rating: 80 },
    DemoQuestion { id: "demo-geo-1", text: "How many degrees are in a right angle?", options: &["90", "180", "45"], answer: "90", topic: "Geometry", subject: "Mathematics", difficulty: Difficulty::Easy, rating: 15 },
    DemoQuestion { id: "demo-geo-2", text: "Area of a 3 by 4 rectangle?", options: &["12", "7", "14"], answer: "12", topic: "Geometry", subject: "Mathematics", difficulty: Difficulty::Medium, rating: 40 },
    DemoQuestion { id: "demo-geo-3", text: "Hypotenuse of a 5-12 right triangle?", options: &["13", "17", "11"], answer: "13", topic: "Geometry", subject: "Mathematics", difficulty: Difficulty::Hard, rating: 70 },
    DemoQuestion { id: "demo-gram-1", text: "Plural of 'child'?", options: &["children", "childs", "childes"], answer: "children", topic: "Grammar", subject: "English", difficulty: Difficulty::Easy, rating: 20 },
    DemoQuestion { id: "demo-gram-2", text: "Past tense of 'swim'?", options: &["swam", "swimmed", "swum"], answer: "swam", topic: "Grammar", subject: "English", difficulty: Difficulty::Medium, rating: 45 },
];

const DEMO_LESSONS: &[(&str, &str, &str)] = &[
    ("demo-lesson-fractions", "Adding fractions", "Mathematics"),
    ("demo-lesson-equations", "One-step equations", "Mathematics"),
    ("demo-lesson-plurals", "Irregular plurals", "English"),
];

/// Insert the demo student, question bank, lesson catalog and one homework
/// assignment.
/// Records that already exist are never overwritten.
pub fn seed_demo_data(store: &Store) -> Result<SeedSummary, StoreError> {
    let now = Utc::now();
    let mut summary = SeedSummary::default();

    if store.get_student(DEMO_STUDENT_ID)?.is_none() {
        store.create_student(&StudentProfile::new(DEMO_STUDENT_ID, "Demo Student", now))?;
        summary.students_created += 1;
    }

    for demo in DEMO_QUESTIONS {
        if store.get_question(demo.id)?.is_some() {
            continue;
        }
        let question = Question {
            id: demo.id.to_string(),
            text: demo.text.to_string(),
            options: demo.options.iter().map(|o| o.to_string()).collect(),
            correct_answer: demo.answer.to_string(),
            topic: demo.topic.to_string(),
            subject: demo.subject.to_string(),
            difficulty: demo.difficulty,
            grade_rating: demo.rating,
            explanation: None,
            hint: None,
            video_solution_url: None,
            created_at: now,
        };
        question.validate()?;
        store.upsert_question(&question)?;
        summary.questions_created += 1;
    }

    for (id, title, subject) in DEMO_LESSONS {
        if store.get_lesson(id)?.is_some() {
            continue;
        }
        store.create_lesson(&Lesson {
            id: id.to_string(),
            title: title.to_string(),
            subject: subject.to_string(),
            created_at: now,
        })?;
        summary.lessons_created += 1;
    }

    if store.get_homework(DEMO_STUDENT_ID, DEMO_HOMEWORK_ID)?.is_none() {
        store.create_homework(&HomeworkAssignment {
            id: DEMO_HOMEWORK_ID.to_string(),
            student_id: DEMO_STUDENT_ID.to_string(),
            title: "Fractions practice".to_string(),
            subject: "Mathematics".to_string(),
            due_date: now + Duration::days(7),
            completion_status: CompletionStatus::NotStarted,
            completed_at: None,
            created_at: now,
        })?;
        summary.homework_created += 1;
    }

    tracing::info!(
        students = summary.students_created,
        questions = summary.questions_created,
        lessons = summary.lessons_created,
        homework = summary.homework_created,
        "Demo data seeded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::temp_store;

    #[test]
    fn seeding_twice_creates_nothing_new() {
        let (_dir, store) = temp_store();
        let first = seed_demo_data(&store).unwrap();
        assert_eq!(first.students_created, 1);
        assert_eq!(first.questions_created, DEMO_QUESTIONS.len());
        assert_eq!(first.lessons_created, DEMO_LESSONS.len());
        assert_eq!(first.homework_created, 1);

        let second = seed_demo_data(&store).unwrap();
        assert_eq!(second, SeedSummary::default());
        assert_eq!(store.list_questions().unwrap().len(), DEMO_QUESTIONS.len());
    }

    #[test]
    fn demo_ratings_are_valid() {
        for demo in DEMO_QUESTIONS {
            assert!((10..=99).contains(&demo.rating), "{}", demo.id);
        }
    }
}
