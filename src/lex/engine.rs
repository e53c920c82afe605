use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::lex::badges::{self, BadgeAward};
use crate::lex::bank::QuestionBank;
use crate::lex::config::LexConfig;
use crate::lex::coursework::{self, HomeworkOutcome, LessonOutcome};
use crate::lex::error::EngineError;
use crate::lex::leaderboard;
use crate::lex::maintenance::{self, DailyReport, StudentScope, WeeklyReport};
use crate::lex::mastery::{self, TopicMastery};
use crate::lex::ports::{
    AttemptRepository, BadgeRepository, CourseworkRepository, QuestionRepository,
    SessionRepository, StudentRepository,
};
use crate::lex::profile::{self, ProfileUpdate, ReplacePerSession, TopicClassifier};
use crate::lex::selector::{self, PoolOutcome};
use crate::lex::stepper;
use crate::lex::xp::{self, answer_xp};
use crate::store::operations::attempts::QuestionAttempt;
use crate::store::operations::badges::{Badge, StudentBadge};
use crate::store::operations::coursework::{CompletionStatus, HomeworkAssignment, Lesson};
use crate::store::operations::leaderboard::{LeaderboardEntry, LeaderboardRun};
use crate::store::operations::questions::Question;
use crate::store::operations::sessions::IssuedSession;
use crate::store::operations::students::StudentProfile;
use crate::store::operations::xp_events::{XpAction, XpBalance};
use crate::store::Store;

/// Per-student mutual exclusion for read-modify-write sequences on one
/// student's state. Different students never contend.
#[derive(Clone, Default)]
pub struct UserLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl UserLocks {
    fn entry(locks: &mut HashMap<String, Arc<Mutex<()>>>, student_id: &str) -> Arc<Mutex<()>> {
        // Arc::strong_count == 1 means only the map holds it, so it is idle.
        if locks.len() > 1000 {
            locks.retain(|_, v| Arc::strong_count(v) > 1);
        }
        locks
            .entry(student_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn acquire(&self, student_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().await;
        Self::entry(&mut locks, student_id)
    }

    /// For blocking threads only; panics inside an async context.
    pub fn acquire_blocking(&self, student_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.inner.blocking_lock();
        Self::entry(&mut locks, student_id)
    }
}

impl StudentScope for UserLocks {
    fn scoped(
        &self,
        student_id: &str,
        work: &mut dyn FnMut() -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let lock = self.acquire_blocking(student_id);
        let _guard = lock.blocking_lock();
        work()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub question_id: String,
    pub answer: String,
    /// Seconds.
    pub time_taken: u32,
    #[serde(default)]
    pub watched_solution: bool,
}

/// A selection that has been recorded as issued to the student.
#[derive(Debug, Clone)]
pub struct GeneratedSession {
    pub session_id: String,
    pub questions: Vec<Question>,
    pub pools: Vec<PoolOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradedAnswer {
    pub question_id: String,
    pub correct: bool,
    pub xp: u64,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: String,
    pub answers: Vec<GradedAnswer>,
    pub correct: usize,
    pub total: usize,
    pub profile: ProfileUpdate,
    pub current_working_average: f64,
    pub xp_awarded: u64,
    /// Absent when the session earned no XP.
    pub balance: Option<XpBalance>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub profile: StudentProfile,
    pub xp_into_level: u64,
    pub xp_for_next_level: u64,
    pub badges_earned: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardView {
    pub run: LeaderboardRun,
    pub entries: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub id: String,
    pub title: String,
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHomework {
    pub id: Option<String>,
    pub student_id: String,
    pub title: String,
    pub subject: String,
    pub due_date: DateTime<Utc>,
}

/// Answers must come from the issued session, each question at most once,
/// and never more than `session_size` of them.
fn check_submission(
    issued: &IssuedSession,
    answers: &[SubmittedAnswer],
    session_size: usize,
) -> Result<(), EngineError> {
    if answers.len() > session_size {
        return Err(EngineError::InvalidState(format!(
            "a session accepts at most {session_size} answers, got {}",
            answers.len()
        )));
    }
    let mut seen = HashSet::with_capacity(answers.len());
    for answer in answers {
        if !seen.insert(answer.question_id.as_str()) {
            return Err(EngineError::InvalidState(format!(
                "question {} answered more than once",
                answer.question_id
            )));
        }
        if !issued.contains(&answer.question_id) {
            return Err(EngineError::InvalidState(format!(
                "question {} is not part of session {}",
                answer.question_id, issued.id
            )));
        }
    }
    Ok(())
}

pub struct LexEngine {
    config: Arc<RwLock<LexConfig>>,
    store: Arc<Store>,
    user_locks: UserLocks,
    classifier: Arc<dyn TopicClassifier>,
}

impl LexEngine {
    pub fn new(config: LexConfig, store: Arc<Store>) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            store,
            user_locks: UserLocks::default(),
            classifier: Arc::new(ReplacePerSession),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn TopicClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub async fn reload_config(&self, new_config: LexConfig) -> Result<(), String> {
        new_config.validate()?;
        let mut cfg = self.config.write().await;
        *cfg = new_config;
        tracing::info!("Lex config reloaded");
        Ok(())
    }

    pub async fn get_config(&self) -> LexConfig {
        self.config.read().await.clone()
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn require_student(&self, student_id: &str) -> Result<StudentProfile, EngineError> {
        self.store
            .get_student(student_id)?
            .ok_or_else(|| EngineError::not_found("student", student_id))
    }

    pub async fn generate_session(&self, student_id: &str) -> Result<GeneratedSession, EngineError> {
        let mut rng = StdRng::from_entropy();
        self.generate_session_with_rng(student_id, Utc::now(), &mut rng).await
    }

    /// Select a session and record it as issued, so completion can be checked
    /// against it.
    pub async fn generate_session_with_rng<R>(
        &self,
        student_id: &str,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> Result<GeneratedSession, EngineError>
    where
        R: Rng + ?Sized,
    {
        let config = self.config.read().await.clone();
        let profile = self.require_student(student_id)?;
        let bank = QuestionBank::load(self.store.as_ref())?;
        let history = self.store.all_attempts(student_id)?;
        let selection =
            selector::generate_session_questions(&bank, &history, &profile, &config.session, now, rng);

        let issued = IssuedSession {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            question_ids: selection.questions.iter().map(|q| q.id.clone()).collect(),
            issued_at: now,
            completed_at: None,
        };
        self.store.insert_issued_session(&issued)?;
        tracing::info!(
            student_id,
            session_id = %issued.id,
            selected = selection.questions.len(),
            "Lex session generated"
        );
        Ok(GeneratedSession {
            session_id: issued.id,
            questions: selection.questions,
            pools: selection.pools,
        })
    }

    /// Grade a finished session, record its attempts, replace the topic sets,
    /// recompute the CWA and grant the session's XP, serialized per student.
    ///
    /// The session must have been issued to this student and not completed
    /// yet; it is closed before any attempt is written.
    pub async fn complete_session(
        &self,
        student_id: &str,
        session_id: &str,
        answers: Vec<SubmittedAnswer>,
    ) -> Result<SessionResult, EngineError> {
        let user_lock = self.user_locks.acquire(student_id).await;
        let _guard = user_lock.lock().await;

        let config = self.config.read().await.clone();
        let now = Utc::now();
        self.require_student(student_id)?;
        if answers.is_empty() {
            return Err(EngineError::InvalidState("session has no answers".to_string()));
        }
        let issued = self
            .store
            .get_issued_session(student_id, session_id)?
            .ok_or_else(|| EngineError::not_found("session", session_id))?;
        if issued.completed_at.is_some() {
            return Err(EngineError::conflict("session", session_id));
        }
        check_submission(&issued, &answers, config.session.session_size)?;

        let mut questions: Vec<Question> = Vec::with_capacity(answers.len());
        for answer in &answers {
            let question = self
                .store
                .get_question(&answer.question_id)?
                .ok_or_else(|| EngineError::not_found("question", &answer.question_id))?;
            questions.push(question);
        }
        self.store.close_issued_session(student_id, session_id, now)?;
        let session_id = issued.id;

        let mut attempts = Vec::with_capacity(answers.len());
        let mut graded = Vec::with_capacity(answers.len());
        let mut xp_awarded = 0u64;
        for (answer, question) in answers.iter().zip(&questions) {
            let correct = question.is_correct_answer(&answer.answer);
            let xp = answer_xp(
                &config.xp,
                question.difficulty,
                correct,
                answer.time_taken,
                answer.watched_solution,
            );
            xp_awarded += xp;
            let attempt = QuestionAttempt {
                id: Uuid::new_v4().to_string(),
                student_id: student_id.to_string(),
                question_id: question.id.clone(),
                attempt_date: now,
                correct,
                time_taken: answer.time_taken,
                watched_solution: answer.watched_solution,
                session_id: Some(session_id.clone()),
            };
            self.store.append_attempt(&attempt)?;
            attempts.push(attempt);
            graded.push(GradedAnswer {
                question_id: question.id.clone(),
                correct,
                xp,
                correct_answer: question.correct_answer.clone(),
                explanation: question.explanation.clone(),
            });
        }

        let profile = profile::update_profile(
            self.store.as_ref(),
            self.classifier.as_ref(),
            student_id,
            &questions,
            &attempts,
            &config.mastery,
            now,
        )?;

        let cwa = mastery::student_cwa(self.store.as_ref(), student_id, config.mastery.cwa_window)?;
        self.store
            .update_student(student_id, &|p| p.current_working_average = cwa)?;

        let balance = if xp_awarded > 0 {
            Some(xp::record_xp(
                self.store.as_ref(),
                &config.xp,
                student_id,
                XpAction::LexSession,
                xp_awarded,
                &format!("lex_session_{session_id}"),
                now,
            )?)
        } else {
            None
        };

        let correct = attempts.iter().filter(|a| a.correct).count();
        tracing::info!(
            student_id,
            session_id = %session_id,
            correct,
            total = attempts.len(),
            cwa,
            xp_awarded,
            "Lex session completed"
        );
        Ok(SessionResult {
            session_id,
            answers: graded,
            correct,
            total: attempts.len(),
            profile,
            current_working_average: cwa,
            xp_awarded,
            balance,
        })
    }

    pub async fn next_question(
        &self,
        current_question_id: &str,
        was_correct: bool,
    ) -> Result<Option<Question>, EngineError> {
        let current = self
            .store
            .get_question(current_question_id)?
            .ok_or_else(|| EngineError::not_found("question", current_question_id))?;
        let bank = QuestionBank::new(self.store.list_questions_by_topic(&current.topic)?);
        let mut rng = StdRng::from_entropy();
        Ok(stepper::next_question(&bank, &current, was_correct, &mut rng).cloned())
    }

    pub async fn progress(&self, student_id: &str) -> Result<ProgressView, EngineError> {
        let config = self.config.read().await.clone();
        let profile = self.require_student(student_id)?;
        let per_level = config.xp.xp_per_level;
        let xp_into_level = profile.xp_total % per_level;
        let badges_earned = self.store.student_badges(student_id)?.len();
        Ok(ProgressView {
            xp_into_level,
            xp_for_next_level: per_level - xp_into_level,
            badges_earned,
            profile,
        })
    }

    pub async fn topic_mastery(&self, student_id: &str, topic: &str) -> Result<TopicMastery, EngineError> {
        self.require_student(student_id)?;
        let bank = QuestionBank::new(self.store.list_questions_by_topic(topic)?);
        let attempts = self.store.all_attempts(student_id)?;
        Ok(mastery::topic_mastery(&attempts, &bank, topic))
    }

    /// Record a login, at most once a minute per student.
    pub async fn touch_login(&self, student_id: &str) -> Result<(), EngineError> {
        let now = Utc::now();
        let profile = self.require_student(student_id)?;
        if profile
            .last_login
            .is_some_and(|last| now - last < Duration::minutes(1))
        {
            return Ok(());
        }
        self.store
            .update_student(student_id, &|p| p.last_login = Some(now))?;
        Ok(())
    }

    pub async fn create_lesson(&self, new: NewLesson) -> Result<Lesson, EngineError> {
        let lesson = Lesson {
            id: new.id,
            title: new.title,
            subject: new.subject,
            created_at: Utc::now(),
        };
        self.store.create_lesson(&lesson)?;
        tracing::info!(lesson_id = %lesson.id, subject = %lesson.subject, "Lesson registered");
        Ok(lesson)
    }

    pub async fn complete_lesson(
        &self,
        student_id: &str,
        lesson_id: &str,
    ) -> Result<LessonOutcome, EngineError> {
        let user_lock = self.user_locks.acquire(student_id).await;
        let _guard = user_lock.lock().await;
        let config = self.config.read().await.clone();
        coursework::complete_lesson(
            self.store.as_ref(),
            &config.xp,
            student_id,
            lesson_id,
            Utc::now(),
        )
    }

    pub async fn list_homework(&self, student_id: &str) -> Result<Vec<HomeworkAssignment>, EngineError> {
        Ok(self.store.list_homework(student_id)?)
    }

    pub async fn create_homework(&self, new: NewHomework) -> Result<HomeworkAssignment, EngineError> {
        self.require_student(&new.student_id)?;
        let assignment = HomeworkAssignment {
            id: new.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            student_id: new.student_id,
            title: new.title,
            subject: new.subject,
            due_date: new.due_date,
            completion_status: CompletionStatus::NotStarted,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.store.create_homework(&assignment)?;
        Ok(assignment)
    }

    pub async fn start_homework(
        &self,
        student_id: &str,
        homework_id: &str,
    ) -> Result<HomeworkAssignment, EngineError> {
        let user_lock = self.user_locks.acquire(student_id).await;
        let _guard = user_lock.lock().await;
        coursework::start_homework(self.store.as_ref(), student_id, homework_id)
    }

    pub async fn complete_homework(
        &self,
        student_id: &str,
        homework_id: &str,
    ) -> Result<HomeworkOutcome, EngineError> {
        let user_lock = self.user_locks.acquire(student_id).await;
        let _guard = user_lock.lock().await;
        let config = self.config.read().await.clone();
        coursework::complete_homework(
            self.store.as_ref(),
            &config.xp,
            student_id,
            homework_id,
            Utc::now(),
        )
    }

    pub async fn earned_badges(&self, student_id: &str) -> Result<Vec<StudentBadge>, EngineError> {
        Ok(self.store.student_badges(student_id)?)
    }

    pub async fn eligible_badges(&self, student_id: &str) -> Result<Vec<Badge>, EngineError> {
        let bank = QuestionBank::load(self.store.as_ref())?;
        let mut out = Vec::new();
        for badge_id in badges::check_eligibility(self.store.as_ref(), &bank, student_id)? {
            if let Some(badge) = self.store.get_badge(&badge_id)? {
                out.push(badge);
            }
        }
        Ok(out)
    }

    pub async fn award_badge(&self, student_id: &str, badge_id: &str) -> Result<BadgeAward, EngineError> {
        let user_lock = self.user_locks.acquire(student_id).await;
        let _guard = user_lock.lock().await;
        let config = self.config.read().await.clone();
        badges::award_badge(self.store.as_ref(), &config.xp, student_id, badge_id, Utc::now())
    }

    pub async fn latest_leaderboard(&self) -> Result<Option<LeaderboardView>, EngineError> {
        Ok(leaderboard::latest_leaderboard(self.store.as_ref())?
            .map(|(run, entries)| LeaderboardView { run, entries }))
    }

    pub async fn create_student(
        &self,
        student_id: &str,
        display_name: &str,
        parent_id: Option<String>,
    ) -> Result<StudentProfile, EngineError> {
        let mut profile = StudentProfile::new(student_id, display_name, Utc::now());
        profile.parent_id = parent_id;
        self.store.create_student(&profile)?;
        tracing::info!(student_id, "Student created");
        Ok(profile)
    }

    /// Validate every question before writing any of them.
    pub async fn upsert_questions(&self, questions: Vec<Question>) -> Result<usize, EngineError> {
        for question in &questions {
            question.validate()?;
        }
        for question in &questions {
            self.store.upsert_question(question)?;
        }
        tracing::info!(count = questions.len(), "Questions upserted");
        Ok(questions.len())
    }

    pub async fn grant_xp(
        &self,
        student_id: &str,
        action: XpAction,
        amount: u64,
        trigger: &str,
    ) -> Result<XpBalance, EngineError> {
        let user_lock = self.user_locks.acquire(student_id).await;
        let _guard = user_lock.lock().await;
        let config = self.config.read().await.clone();
        xp::record_xp(
            self.store.as_ref(),
            &config.xp,
            student_id,
            action,
            amount,
            trigger,
            Utc::now(),
        )
    }

    pub async fn run_daily_maintenance(&self) -> Result<DailyReport, EngineError> {
        self.run_daily_maintenance_at(Utc::now()).await
    }

    pub async fn run_weekly_maintenance(&self) -> Result<WeeklyReport, EngineError> {
        self.run_weekly_maintenance_at(Utc::now()).await
    }

    pub async fn run_daily_maintenance_at(&self, now: DateTime<Utc>) -> Result<DailyReport, EngineError> {
        let config = self.config.read().await.clone();
        let store = Arc::clone(&self.store);
        let locks = self.user_locks.clone();
        tokio::task::spawn_blocking(move || {
            maintenance::run_daily_maintenance(store.as_ref(), &config, &locks, now)
        })
        .await
        .map_err(|e| EngineError::Internal(format!("daily maintenance task failed: {e}")))?
    }

    pub async fn run_weekly_maintenance_at(&self, now: DateTime<Utc>) -> Result<WeeklyReport, EngineError> {
        let config = self.config.read().await.clone();
        let store = Arc::clone(&self.store);
        let locks = self.user_locks.clone();
        tokio::task::spawn_blocking(move || {
            maintenance::run_weekly_maintenance(store.as_ref(), &config, &locks, now)
        })
        .await
        .map_err(|e| EngineError::Internal(format!("weekly maintenance task failed: {e}")))?
    }
}
