use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::QuestionId;
use crate::model::question::{AnswerChoice, Question};

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("question id cannot be empty")]
    EmptyQuestionId,

    #[error("time spent must be a finite, non-negative number of seconds")]
    InvalidTimeSpent,
}

//
// ─── ANSWER ───────────────────────────────────────────────────────────────────
//

/// Serialized form of an `Answer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerProps {
    pub question_id: String,
    pub user_answer: AnswerChoice,
    pub is_correct: bool,
    /// Seconds.
    pub time_spent: f64,
    pub answered_at: DateTime<Utc>,
}

/// A committed choice for one question. Owned by exactly one `QuizSession`.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    question_id: QuestionId,
    user_answer: AnswerChoice,
    is_correct: bool,
    time_spent: f64,
    answered_at: DateTime<Utc>,
}

impl Answer {
    /// # Errors
    ///
    /// Returns `AnswerError` for a blank question id or a negative/non-finite time.
    pub fn create(props: AnswerProps) -> Result<Self, AnswerError> {
        let question_id =
            QuestionId::new(props.question_id).map_err(|_| AnswerError::EmptyQuestionId)?;
        if !props.time_spent.is_finite() || props.time_spent < 0.0 {
            return Err(AnswerError::InvalidTimeSpent);
        }

        Ok(Self {
            question_id,
            user_answer: props.user_answer,
            is_correct: props.is_correct,
            time_spent: props.time_spent,
            answered_at: props.answered_at,
        })
    }

    /// Record `choice` for `question`, grading it at answer time.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::InvalidTimeSpent` if `time_spent` is negative or not finite.
    pub fn for_question(
        question: &Question,
        choice: AnswerChoice,
        time_spent: f64,
        answered_at: DateTime<Utc>,
    ) -> Result<Self, AnswerError> {
        let is_correct = question.is_correct_answer(&choice);
        Self::create(AnswerProps {
            question_id: question.id().to_string(),
            user_answer: choice,
            is_correct,
            time_spent,
            answered_at,
        })
    }

    #[must_use]
    pub fn to_props(&self) -> AnswerProps {
        AnswerProps {
            question_id: self.question_id.to_string(),
            user_answer: self.user_answer.clone(),
            is_correct: self.is_correct,
            time_spent: self.time_spent,
            answered_at: self.answered_at,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn user_answer(&self) -> &AnswerChoice {
        &self.user_answer
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn time_spent(&self) -> f64 {
        self.time_spent
    }

    #[must_use]
    pub fn answered_at(&self) -> DateTime<Utc> {
        self.answered_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::tests::props;
    use crate::time::fixed_now;

    fn answer_props(time_spent: f64) -> AnswerProps {
        AnswerProps {
            question_id: "q1".to_owned(),
            user_answer: AnswerChoice::Single(1),
            is_correct: true,
            time_spent,
            answered_at: fixed_now(),
        }
    }

    #[test]
    fn negative_time_fails() {
        let err = Answer::create(answer_props(-0.5)).unwrap_err();
        assert_eq!(err, AnswerError::InvalidTimeSpent);
        assert!(Answer::create(answer_props(f64::NAN)).is_err());
        assert!(Answer::create(answer_props(0.0)).is_ok());
    }

    #[test]
    fn blank_question_id_fails() {
        let mut p = answer_props(1.0);
        p.question_id = String::new();
        assert_eq!(Answer::create(p).unwrap_err(), AnswerError::EmptyQuestionId);
    }

    #[test]
    fn for_question_grades_at_answer_time() {
        let q = Question::create(props("q1", 5, AnswerChoice::Single(1))).unwrap();

        let right = Answer::for_question(&q, AnswerChoice::Single(1), 4.0, fixed_now()).unwrap();
        let wrong = Answer::for_question(&q, AnswerChoice::Single(2), 4.0, fixed_now()).unwrap();

        assert!(right.is_correct());
        assert!(!wrong.is_correct());
        assert_eq!(right.question_id(), q.id());
    }

    #[test]
    fn round_trip_preserves_fields() {
        let a = Answer::create(answer_props(12.5)).unwrap();
        assert_eq!(Answer::create(a.to_props()).unwrap(), a);
    }
}
