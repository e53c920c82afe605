//! Lessons and homework: completion bookkeeping, the homework status
//! machine and the XP each completion grants.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lex::config::XpConfig;
use crate::lex::error::EngineError;
use crate::lex::ports::{CourseworkRepository, StudentRepository, XpLedger};
use crate::lex::xp::record_xp;
use crate::store::operations::coursework::{
    CompletionStatus, HomeworkAssignment, Lesson, LessonCompletion,
};
use crate::store::operations::xp_events::{XpAction, XpBalance};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonOutcome {
    pub lesson_id: String,
    /// False when the lesson had already been completed.
    pub newly_completed: bool,
    pub balance: Option<XpBalance>,
}

/// Only lessons in the catalog can be completed; the subject credited is the
/// catalog's.
pub fn complete_lesson<R>(
    repo: &R,
    config: &XpConfig,
    student_id: &str,
    lesson_id: &str,
    now: DateTime<Utc>,
) -> Result<LessonOutcome, EngineError>
where
    R: CourseworkRepository + StudentRepository + XpLedger + ?Sized,
{
    if repo.get_student(student_id)?.is_none() {
        return Err(EngineError::not_found("student", student_id));
    }
    let lesson: Lesson = repo
        .get_lesson(lesson_id)?
        .ok_or_else(|| EngineError::not_found("lesson", lesson_id))?;
    let newly_completed = repo.record_lesson_completion(&LessonCompletion {
        student_id: student_id.to_string(),
        lesson_id: lesson.id.clone(),
        subject: lesson.subject,
        completed_at: now,
    })?;
    if !newly_completed {
        return Ok(LessonOutcome {
            lesson_id: lesson_id.to_string(),
            newly_completed,
            balance: None,
        });
    }

    let balance = record_xp(
        repo,
        config,
        student_id,
        XpAction::LessonCompleted,
        config.lesson_completed,
        &format!("lesson_{lesson_id}"),
        now,
    )?;
    repo.update_student(student_id, &|p| p.last_study_date = Some(now))?;
    Ok(LessonOutcome {
        lesson_id: lesson_id.to_string(),
        newly_completed,
        balance: Some(balance),
    })
}

fn load_homework<R>(repo: &R, student_id: &str, homework_id: &str) -> Result<HomeworkAssignment, EngineError>
where
    R: CourseworkRepository + ?Sized,
{
    repo.get_homework(student_id, homework_id)?
        .ok_or_else(|| EngineError::not_found("homework", homework_id))
}

fn transition(assignment: &mut HomeworkAssignment, next: CompletionStatus) -> Result<(), EngineError> {
    if !assignment.completion_status.can_transition_to(next) {
        return Err(EngineError::InvalidState(format!(
            "homework {} cannot move from {} to {}",
            assignment.id,
            assignment.completion_status.as_str(),
            next.as_str()
        )));
    }
    assignment.completion_status = next;
    Ok(())
}

pub fn start_homework<R>(
    repo: &R,
    student_id: &str,
    homework_id: &str,
) -> Result<HomeworkAssignment, EngineError>
where
    R: CourseworkRepository + ?Sized,
{
    let mut assignment = load_homework(repo, student_id, homework_id)?;
    transition(&mut assignment, CompletionStatus::InProgress)?;
    repo.save_homework(&assignment)?;
    Ok(assignment)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkOutcome {
    pub assignment: HomeworkAssignment,
    pub balance: XpBalance,
}

pub fn complete_homework<R>(
    repo: &R,
    config: &XpConfig,
    student_id: &str,
    homework_id: &str,
    now: DateTime<Utc>,
) -> Result<HomeworkOutcome, EngineError>
where
    R: CourseworkRepository + StudentRepository + XpLedger + ?Sized,
{
    if repo.get_student(student_id)?.is_none() {
        return Err(EngineError::not_found("student", student_id));
    }
    let mut assignment = load_homework(repo, student_id, homework_id)?;
    transition(&mut assignment, CompletionStatus::Completed)?;
    assignment.completed_at = Some(now);
    repo.save_homework(&assignment)?;

    let balance = record_xp(
        repo,
        config,
        student_id,
        XpAction::HomeworkCompleted,
        config.homework_completed,
        &format!("homework_{homework_id}"),
        now,
    )?;
    repo.update_student(student_id, &|p| p.last_study_date = Some(now))?;
    Ok(HomeworkOutcome { assignment, balance })
}

/// Mark every open assignment past its due date as overdue. Returns how many
/// changed.
pub fn sweep_overdue<R>(repo: &R, student_id: &str, now: DateTime<Utc>) -> Result<usize, EngineError>
where
    R: CourseworkRepository + ?Sized,
{
    let mut changed = 0;
    for mut assignment in repo.list_homework(student_id)? {
        if assignment.due_date >= now || assignment.completion_status.is_terminal() {
            continue;
        }
        transition(&mut assignment, CompletionStatus::Overdue)?;
        repo.save_homework(&assignment)?;
        changed += 1;
    }
    Ok(changed)
}
