//! Pure scoring, XP, and leveling rules.

use crate::model::{AnswerChoice, Question, Rank, User, UserError};

/// XP granted per point of session score.
pub const XP_PER_POINT: u64 = 10;

/// XP span of one level.
pub const XP_PER_LEVEL: u64 = 1_000;

/// Weighted outcome of a set of answers aligned to a question sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionScore {
    pub total_score: u32,
    pub max_score: u32,
    pub correct: usize,
    pub total_questions: usize,
}

impl SessionScore {
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        accuracy_percent(self.correct, self.total_questions)
    }
}

/// Sum of weights over all `questions`.
#[must_use]
pub fn max_score(questions: &[Question]) -> u32 {
    questions.iter().map(|q| u32::from(q.weight())).sum()
}

/// Score `choices` against `questions` position by position.
///
/// Questions without a matching choice count toward `max_score` only.
#[must_use]
pub fn score_answers(questions: &[Question], choices: &[AnswerChoice]) -> SessionScore {
    let mut total_score = 0_u32;
    let mut correct = 0_usize;

    for (question, choice) in questions.iter().zip(choices) {
        if question.is_correct_answer(choice) {
            total_score += u32::from(question.weight());
            correct += 1;
        }
    }

    SessionScore {
        total_score,
        max_score: max_score(questions),
        correct,
        total_questions: questions.len(),
    }
}

/// `round(100 * numerator / denominator)`, half rounding up; 0 when the denominator is 0.
#[must_use]
pub fn percent(numerator: u64, denominator: u64) -> u32 {
    if denominator == 0 {
        return 0;
    }
    let (n, d) = (u128::from(numerator), u128::from(denominator));
    let scaled = (200 * n + d) / (2 * d);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

#[must_use]
pub fn accuracy_percent(correct: usize, total: usize) -> u32 {
    percent(correct as u64, total as u64)
}

#[must_use]
pub fn xp_reward(total_score: u32) -> u64 {
    u64::from(total_score) * XP_PER_POINT
}

/// Every 1000 XP is one level; level is always at least 1.
#[must_use]
pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL + 1).unwrap_or(u32::MAX)
}

#[must_use]
pub fn rank_for_xp(xp: u64) -> Rank {
    Rank::for_xp(xp)
}

/// Percent of the current level's XP span already earned, clamped to 0..=100.
#[must_use]
pub fn progress_toward_next_level(xp: u64, level: u32) -> u32 {
    let level_start = u64::from(level.saturating_sub(1)) * XP_PER_LEVEL;
    let earned = xp.saturating_sub(level_start).min(XP_PER_LEVEL);
    percent(earned, XP_PER_LEVEL)
}

/// Result of applying a session reward to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progression {
    pub user: User,
    pub previous_xp: u64,
    pub previous_level: u32,
    pub reward: u64,
}

impl Progression {
    #[must_use]
    pub fn new_xp(&self) -> u64 {
        self.user.xp()
    }

    #[must_use]
    pub fn new_level(&self) -> u32 {
        self.user.level()
    }

    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.user.level() > self.previous_level
    }
}

/// Grant `total_score * XP_PER_POINT` to `user` and recompute the level.
///
/// # Errors
///
/// Propagates `UserError` from rebuilding the user entity.
pub fn apply_reward(user: &User, total_score: u32) -> Result<Progression, UserError> {
    let reward = xp_reward(total_score);
    let new_xp = user.xp().saturating_add(reward);
    let updated = user.with_progress(new_xp, level_for_xp(new_xp))?;

    Ok(Progression {
        user: updated,
        previous_xp: user.xp(),
        previous_level: user.level(),
        reward,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Difficulty, QuestionProps, QuestionType, UserProps};
    use crate::time::fixed_now;

    fn question(id: &str, weight: u8) -> Question {
        Question::create(QuestionProps {
            id: id.to_owned(),
            category: Category::JavaScript,
            difficulty: Difficulty::Middle,
            kind: QuestionType::TrueFalse,
            question: "typeof null === 'object'?".to_owned(),
            code: None,
            options: vec!["true".to_owned(), "false".to_owned()],
            correct_answer: AnswerChoice::Single(0),
            explanation: "Legacy quirk.".to_owned(),
            tags: Vec::new(),
            weight,
        })
        .unwrap()
    }

    fn user(xp: u64) -> User {
        User::create(UserProps {
            id: "u1".to_owned(),
            email: "u1@example.com".to_owned(),
            display_name: "U".to_owned(),
            photo_url: None,
            created_at: fixed_now(),
            level: level_for_xp(xp),
            xp,
        })
        .unwrap()
    }

    #[test]
    fn weighted_score_and_accuracy() {
        let qs = vec![question("a", 3), question("b", 5), question("c", 2)];
        let choices = [0, 1, 0].map(AnswerChoice::Single);

        let score = score_answers(&qs, &choices);

        assert_eq!(score.total_score, 5);
        assert_eq!(score.max_score, 10);
        assert_eq!(score.correct, 2);
        assert_eq!(score.accuracy(), 67);
    }

    #[test]
    fn unanswered_questions_only_raise_the_max() {
        let qs = vec![question("a", 4), question("b", 6)];
        let score = score_answers(&qs, &[AnswerChoice::Single(0)]);
        assert_eq!(score.total_score, 4);
        assert_eq!(score.max_score, 10);
        assert_eq!(score.accuracy(), 50);
    }

    #[test]
    fn percent_rounds_half_up_and_guards_zero() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(1, 8), 13);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn levels_step_every_thousand_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(999), 1);
        assert_eq!(level_for_xp(1_000), 2);
        assert_eq!(level_for_xp(15_000), 16);
        assert_eq!(rank_for_xp(15_000).label(), "Netrunner");
    }

    #[test]
    fn reward_is_ten_xp_per_point() {
        let progression = apply_reward(&user(950), 7).unwrap();
        assert_eq!(progression.reward, 70);
        assert_eq!(progression.new_xp(), 1_020);
        assert_eq!(progression.new_level(), 2);
        assert!(progression.leveled_up());
        assert_eq!(progression.previous_xp, 950);
    }

    #[test]
    fn zero_score_keeps_level() {
        let progression = apply_reward(&user(10), 0).unwrap();
        assert_eq!(progression.new_xp(), 10);
        assert!(!progression.leveled_up());
    }
}
