//! Session question selection.
//!
//! A session is filled from weighted pools in a fixed priority order: topics
//! the student touched recently, their weak topics, topics they have not seen
//! for a while, spaced re-tests of old misses, and finally the whole bank.
//! Each pool samples uniformly without replacement up to its own target; a
//! pool's shortfall is never handed to another targeted pool, only the
//! reattempt and fallback steps backfill the remaining slots.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::lex::bank::QuestionBank;
use crate::lex::config::SessionConfig;
use crate::store::operations::attempts::QuestionAttempt;
use crate::store::operations::questions::Question;
use crate::store::operations::students::StudentProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pool {
    Recent,
    Weak,
    Unseen,
    Reattempt,
    Fallback,
}

impl Pool {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Weak => "weak",
            Self::Unseen => "unseen",
            Self::Reattempt => "reattempt",
            Self::Fallback => "fallback",
        }
    }
}

/// How one pool fared. `taken < target` means the pool was exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOutcome {
    pub pool: Pool,
    pub target: usize,
    pub available: usize,
    pub taken: usize,
}

impl PoolOutcome {
    pub fn exhausted(&self) -> bool {
        self.taken < self.target
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSelection {
    /// Pool-appended order: recent, weak, unseen, reattempt, fallback.
    pub questions: Vec<Question>,
    pub pools: Vec<PoolOutcome>,
}

/// Attempt history reduced to the sets the pools are built from.
struct HistoryView {
    recent_topics: HashSet<String>,
    recent_question_ids: HashSet<String>,
    horizon_topics: HashSet<String>,
    missed_question_ids: HashSet<String>,
    stale_miss_ids: HashSet<String>,
}

impl HistoryView {
    fn build(
        bank: &QuestionBank,
        history: &[QuestionAttempt],
        config: &SessionConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let recent_cutoff = now - Duration::days(config.recent_window_days);
        let horizon_cutoff = now - Duration::days(config.revisit_horizon_days);
        let mut view = Self {
            recent_topics: HashSet::new(),
            recent_question_ids: HashSet::new(),
            horizon_topics: HashSet::new(),
            missed_question_ids: HashSet::new(),
            stale_miss_ids: HashSet::new(),
        };

        for attempt in history {
            let topic = bank.topic_of(&attempt.question_id);
            if attempt.attempt_date >= recent_cutoff {
                view.recent_question_ids.insert(attempt.question_id.clone());
                if let Some(topic) = topic {
                    view.recent_topics.insert(topic.to_string());
                }
            }
            if attempt.attempt_date >= horizon_cutoff {
                if let Some(topic) = topic {
                    view.horizon_topics.insert(topic.to_string());
                }
            }
            if !attempt.correct {
                view.missed_question_ids.insert(attempt.question_id.clone());
                if attempt.attempt_date < horizon_cutoff {
                    view.stale_miss_ids.insert(attempt.question_id.clone());
                }
            }
        }
        view
    }
}

struct Draft<'a, R: Rng + ?Sized> {
    rng: &'a mut R,
    picked: Vec<Question>,
    picked_ids: HashSet<String>,
    pools: Vec<PoolOutcome>,
}

impl<R: Rng + ?Sized> Draft<'_, R> {
    fn draw<'q, I>(&mut self, pool: Pool, target: usize, candidates: I)
    where
        I: Iterator<Item = &'q Question>,
    {
        let eligible: Vec<&Question> = candidates
            .filter(|q| !self.picked_ids.contains(&q.id))
            .collect();
        let chosen: Vec<&Question> = eligible
            .choose_multiple(&mut *self.rng, target)
            .copied()
            .collect();
        for q in &chosen {
            self.picked_ids.insert(q.id.clone());
            self.picked.push((*q).clone());
        }
        let outcome = PoolOutcome {
            pool,
            target,
            available: eligible.len(),
            taken: chosen.len(),
        };
        if outcome.exhausted() {
            tracing::debug!(
                pool = pool.as_str(),
                target,
                available = outcome.available,
                "Selection pool exhausted"
            );
        }
        self.pools.push(outcome);
    }
}

/// Build one session for `profile` against `bank`.
///
/// `history` is the student's attempt log in any order. The result holds at
/// most `config.session_size` distinct questions; fewer only when the bank
/// itself runs out.
pub fn generate_session_questions<R>(
    bank: &QuestionBank,
    history: &[QuestionAttempt],
    profile: &StudentProfile,
    config: &SessionConfig,
    now: DateTime<Utc>,
    rng: &mut R,
) -> SessionSelection
where
    R: Rng + ?Sized,
{
    let view = HistoryView::build(bank, history, config, now);
    let mut draft = Draft {
        rng,
        picked: Vec::with_capacity(config.session_size),
        picked_ids: HashSet::new(),
        pools: Vec::with_capacity(5),
    };

    draft.draw(
        Pool::Recent,
        config.recent_target,
        bank.all().filter(|q| {
            view.recent_topics.contains(&q.topic) && !view.recent_question_ids.contains(&q.id)
        }),
    );

    draft.draw(
        Pool::Weak,
        config.weak_target,
        bank.all().filter(|q| {
            profile.weak_topics.contains(&q.topic) && !view.missed_question_ids.contains(&q.id)
        }),
    );

    draft.draw(
        Pool::Unseen,
        config.unseen_target,
        bank.all().filter(|q| !view.horizon_topics.contains(&q.topic)),
    );

    let remaining = config.session_size.saturating_sub(draft.picked.len());
    draft.draw(
        Pool::Reattempt,
        remaining,
        bank.all().filter(|q| view.stale_miss_ids.contains(&q.id)),
    );

    let remaining = config.session_size.saturating_sub(draft.picked.len());
    draft.draw(Pool::Fallback, remaining, bank.all());

    let mut questions = draft.picked;
    questions.truncate(config.session_size);
    if questions.len() < config.session_size {
        tracing::info!(
            student_id = %profile.id,
            selected = questions.len(),
            target = config.session_size,
            bank_size = bank.len(),
            "Question bank exhausted, returning a short session"
        );
    }

    SessionSelection {
        questions,
        pools: draft.pools,
    }
}
