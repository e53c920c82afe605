use rand::seq::SliceRandom;
use rand::Rng;

use crate::lex::bank::QuestionBank;
use crate::store::operations::questions::Question;

/// Pick the follow-up question within `current`'s topic.
///
/// A correct answer steps up to a strictly harder question when one exists;
/// otherwise, or after a miss, the step goes to an equal-or-easier question.
/// Any other same-topic question is the last resort. `None` only when the
/// topic has nothing besides `current`.
pub fn next_question<'a, R>(
    bank: &'a QuestionBank,
    current: &Question,
    was_correct: bool,
    rng: &mut R,
) -> Option<&'a Question>
where
    R: Rng + ?Sized,
{
    let candidates: Vec<&Question> = bank
        .in_topic(&current.topic)
        .filter(|q| q.id != current.id)
        .collect();
    if candidates.is_empty() {
        return None;
    }

    if was_correct {
        let harder: Vec<&Question> = candidates
            .iter()
            .copied()
            .filter(|q| q.grade_rating > current.grade_rating)
            .collect();
        if let Some(q) = harder.choose(rng) {
            return Some(*q);
        }
    }

    let easier: Vec<&Question> = candidates
        .iter()
        .copied()
        .filter(|q| q.grade_rating <= current.grade_rating)
        .collect();
    if let Some(q) = easier.choose(rng) {
        return Some(*q);
    }

    candidates.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::store::operations::questions::{sample_question, Difficulty};

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            sample_question("q30", "algebra", Difficulty::Easy, 30),
            sample_question("q50", "algebra", Difficulty::Medium, 50),
            sample_question("q50b", "algebra", Difficulty::Medium, 50),
            sample_question("q70", "algebra", Difficulty::Hard, 70),
            sample_question("q90", "algebra", Difficulty::Hard, 90),
            sample_question("g10", "geometry", Difficulty::Easy, 10),
        ])
    }

    #[test]
    fn correct_answer_steps_up() {
        let bank = bank();
        let current = bank.get("q50").unwrap().clone();
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let next = next_question(&bank, &current, true, &mut rng).unwrap();
            assert!(next.grade_rating > 50, "seed {seed} picked {}", next.id);
        }
    }

    #[test]
    fn miss_steps_down_or_level() {
        let bank = bank();
        let current = bank.get("q50").unwrap().clone();
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let next = next_question(&bank, &current, false, &mut rng).unwrap();
            assert!(next.grade_rating <= 50);
            assert_ne!(next.id, "q50");
            assert_eq!(next.topic, "algebra");
        }
    }

    #[test]
    fn hardest_correct_falls_back_to_easier() {
        let bank = bank();
        let current = bank.get("q90").unwrap().clone();
        let mut rng = StdRng::seed_from_u64(9);
        let next = next_question(&bank, &current, true, &mut rng).unwrap();
        assert!(next.grade_rating <= 90);
    }

    #[test]
    fn easiest_miss_falls_back_to_any() {
        let bank = QuestionBank::new(vec![
            sample_question("a", "algebra", Difficulty::Easy, 20),
            sample_question("b", "algebra", Difficulty::Hard, 80),
        ]);
        let current = bank.get("a").unwrap().clone();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(next_question(&bank, &current, false, &mut rng).unwrap().id, "b");
    }

    #[test]
    fn lone_question_has_no_successor() {
        let bank = bank();
        let current = bank.get("g10").unwrap().clone();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(next_question(&bank, &current, true, &mut rng).is_none());
    }
}
