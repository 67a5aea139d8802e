use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answer::{Answer, AnswerError, AnswerProps};
use crate::model::ids::{QuestionId, SessionId, UserId};
use crate::model::question::{Category, Question};
use crate::scoring;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizSessionError {
    #[error("quiz session id cannot be empty")]
    EmptyId,

    #[error("user id cannot be empty")]
    EmptyUserId,

    #[error("quiz session must have at least one question")]
    NoQuestions,

    #[error("question id at position {index} cannot be empty")]
    EmptyQuestionId { index: usize },

    #[error("total score ({total}) cannot exceed max score ({max})")]
    ScoreExceedsMax { total: u32, max: u32 },

    #[error("session has {answers} answers for {questions} questions")]
    TooManyAnswers { answers: usize, questions: usize },

    #[error("answer references question {question_id} which is not part of the session")]
    UnknownQuestion { question_id: String },

    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("invalid answer at position {index}: {source}")]
    Answer {
        index: usize,
        #[source]
        source: AnswerError,
    },
}

/// Serialized form of a `QuizSession`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSessionProps {
    pub id: String,
    pub user_id: String,
    pub category: Category,
    pub question_ids: Vec<String>,
    pub answers: Vec<AnswerProps>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_score: u32,
    pub max_score: u32,
}

/// An active or completed quiz attempt.
///
/// Answers grow monotonically from zero up to the number of questions; every
/// change produces a new session built from the previous one's props.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizSession {
    id: SessionId,
    user_id: UserId,
    category: Category,
    question_ids: Vec<QuestionId>,
    answers: Vec<Answer>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    total_score: u32,
    max_score: u32,
}

impl QuizSession {
    /// Validate and build a session.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError` when ids are blank, there are no questions, answers
    /// outnumber questions or reference foreign questions, the score exceeds the max,
    /// or the completion time precedes the start. The answer count is checked before
    /// the score.
    pub fn create(props: QuizSessionProps) -> Result<Self, QuizSessionError> {
        let id = SessionId::new(props.id).map_err(|_| QuizSessionError::EmptyId)?;
        let user_id = UserId::new(props.user_id).map_err(|_| QuizSessionError::EmptyUserId)?;

        if props.question_ids.is_empty() {
            return Err(QuizSessionError::NoQuestions);
        }
        let question_ids = props
            .question_ids
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                QuestionId::new(raw).map_err(|_| QuizSessionError::EmptyQuestionId { index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if props.answers.len() > question_ids.len() {
            return Err(QuizSessionError::TooManyAnswers {
                answers: props.answers.len(),
                questions: question_ids.len(),
            });
        }
        if props.total_score > props.max_score {
            return Err(QuizSessionError::ScoreExceedsMax {
                total: props.total_score,
                max: props.max_score,
            });
        }
        if let Some(completed_at) = props.completed_at {
            if completed_at < props.started_at {
                return Err(QuizSessionError::InvalidTimeRange);
            }
        }

        let answers = props
            .answers
            .into_iter()
            .enumerate()
            .map(|(index, a)| {
                Answer::create(a).map_err(|source| QuizSessionError::Answer { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(stray) = answers
            .iter()
            .find(|a| !question_ids.contains(a.question_id()))
        {
            return Err(QuizSessionError::UnknownQuestion {
                question_id: stray.question_id().to_string(),
            });
        }

        Ok(Self {
            id,
            user_id,
            category: props.category,
            question_ids,
            answers,
            started_at: props.started_at,
            completed_at: props.completed_at,
            total_score: props.total_score,
            max_score: props.max_score,
        })
    }

    /// Open a fresh session over `questions`, with no answers and a max score equal
    /// to the sum of question weights.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::NoQuestions` if `questions` is empty.
    pub fn start(
        user_id: &UserId,
        category: Category,
        questions: &[Question],
        started_at: DateTime<Utc>,
    ) -> Result<Self, QuizSessionError> {
        Self::create(QuizSessionProps {
            id: SessionId::compose(user_id, started_at).to_string(),
            user_id: user_id.to_string(),
            category,
            question_ids: questions.iter().map(|q| q.id().to_string()).collect(),
            answers: Vec::new(),
            started_at,
            completed_at: None,
            total_score: 0,
            max_score: scoring::max_score(questions),
        })
    }

    #[must_use]
    pub fn to_props(&self) -> QuizSessionProps {
        QuizSessionProps {
            id: self.id.to_string(),
            user_id: self.user_id.to_string(),
            category: self.category.clone(),
            question_ids: self.question_ids.iter().map(ToString::to_string).collect(),
            answers: self.answers.iter().map(Answer::to_props).collect(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            total_score: self.total_score,
            max_score: self.max_score,
        }
    }

    /// New session with `answer` appended and `points` added to the running score.
    ///
    /// # Errors
    ///
    /// Fails with the same invariants as `create` (e.g. answering past the last question).
    pub fn with_answer(&self, answer: &Answer, points: u32) -> Result<Self, QuizSessionError> {
        let mut props = self.to_props();
        props.answers.push(answer.to_props());
        props.total_score = props.total_score.saturating_add(points);
        Self::create(props)
    }

    /// New session stamped as completed at `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns `QuizSessionError::InvalidTimeRange` if `completed_at` precedes the start.
    pub fn completed(&self, completed_at: DateTime<Utc>) -> Result<Self, QuizSessionError> {
        let mut props = self.to_props();
        props.completed_at = Some(completed_at);
        Self::create(props)
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn category(&self) -> &Category {
        &self.category
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    /// Completed once stamped and every question has an answer.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some() && self.answers.len() == self.question_ids.len()
    }

    #[must_use]
    pub fn is_fully_answered(&self) -> bool {
        self.answers.len() == self.question_ids.len()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_correct()).count()
    }

    /// Percentage of questions answered so far.
    #[must_use]
    pub fn progress(&self) -> u32 {
        scoring::accuracy_percent(self.answers.len(), self.question_ids.len())
    }

    /// Percentage of answers so far that were correct; 0 before the first answer.
    #[must_use]
    pub fn accuracy(&self) -> u32 {
        scoring::accuracy_percent(self.correct_count(), self.answers.len())
    }

    /// `total_score / max_score` as a rounded percentage; 0 when the max is 0.
    #[must_use]
    pub fn score_percentage(&self) -> u32 {
        scoring::percent(u64::from(self.total_score), u64::from(self.max_score))
    }

    /// Seconds from start to completion, or to `now` while the session is open.
    #[must_use]
    pub fn duration_secs(&self, now: DateTime<Utc>) -> i64 {
        let end = self.completed_at.unwrap_or(now);
        end.signed_duration_since(self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::AnswerChoice;
    use crate::model::question::tests::props as question_props;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn questions() -> Vec<Question> {
        [("q1", 3), ("q2", 5), ("q3", 2)]
            .into_iter()
            .map(|(id, w)| Question::create(question_props(id, w, AnswerChoice::Single(1))).unwrap())
            .collect()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    #[test]
    fn start_sums_weights_and_has_no_answers() {
        let s = QuizSession::start(&user(), Category::React, &questions(), fixed_now()).unwrap();
        assert_eq!(s.max_score(), 10);
        assert_eq!(s.total_score(), 0);
        assert!(s.answers().is_empty());
        assert_eq!(s.id().as_str(), "user-1_1700000000000");
        assert!(!s.is_completed());
    }

    #[test]
    fn total_above_max_fails() {
        let s = QuizSession::start(&user(), Category::React, &questions(), fixed_now()).unwrap();
        let mut props = s.to_props();
        props.total_score = 11;
        assert_eq!(
            QuizSession::create(props).unwrap_err(),
            QuizSessionError::ScoreExceedsMax { total: 11, max: 10 }
        );
    }

    #[test]
    fn empty_question_list_fails() {
        let err = QuizSession::start(&user(), Category::React, &[], fixed_now()).unwrap_err();
        assert_eq!(err, QuizSessionError::NoQuestions);
    }

    #[test]
    fn accuracy_and_score_percentage() {
        let qs = questions();
        let now = fixed_now();
        let mut s = QuizSession::start(&user(), Category::React, &qs, now).unwrap();
        assert_eq!(s.accuracy(), 0);
        assert_eq!(s.score_percentage(), 0);

        for (q, choice) in qs.iter().zip([1, 0, 1]) {
            let a = Answer::for_question(q, AnswerChoice::Single(choice), 2.0, now).unwrap();
            let points = if a.is_correct() { u32::from(q.weight()) } else { 0 };
            s = s.with_answer(&a, points).unwrap();
        }

        assert_eq!(s.total_score(), 5);
        assert_eq!(s.accuracy(), 67);
        assert_eq!(s.score_percentage(), 50);
        assert_eq!(s.progress(), 100);
        assert!(s.is_fully_answered());
    }

    #[test]
    fn answering_past_the_end_fails() {
        let qs = questions();
        let now = fixed_now();
        let mut s = QuizSession::start(&user(), Category::React, &qs[..1], now).unwrap();
        let a = Answer::for_question(&qs[0], AnswerChoice::Single(1), 1.0, now).unwrap();
        s = s.with_answer(&a, 3).unwrap();
        let err = s.with_answer(&a, 3).unwrap_err();
        assert!(matches!(err, QuizSessionError::TooManyAnswers { .. }));
    }

    #[test]
    fn answer_for_foreign_question_fails() {
        let qs = questions();
        let now = fixed_now();
        let s = QuizSession::start(&user(), Category::React, &qs[..2], now).unwrap();
        let stray = Answer::for_question(&qs[2], AnswerChoice::Single(1), 1.0, now).unwrap();
        let err = s.with_answer(&stray, 0).unwrap_err();
        assert!(matches!(err, QuizSessionError::UnknownQuestion { .. }));
    }

    #[test]
    fn duration_uses_now_while_open() {
        let start = fixed_now();
        let s = QuizSession::start(&user(), Category::Css, &questions(), start).unwrap();
        assert_eq!(s.duration_secs(start + Duration::seconds(90)), 90);

        let done = s.completed(start + Duration::seconds(30)).unwrap();
        assert_eq!(done.duration_secs(start + Duration::hours(5)), 30);
    }

    #[test]
    fn completion_before_start_fails() {
        let start = fixed_now();
        let s = QuizSession::start(&user(), Category::Css, &questions(), start).unwrap();
        let err = s.completed(start - Duration::seconds(1)).unwrap_err();
        assert_eq!(err, QuizSessionError::InvalidTimeRange);
    }

    #[test]
    fn props_round_trip() {
        let qs = questions();
        let now = fixed_now();
        let a = Answer::for_question(&qs[0], AnswerChoice::Single(1), 1.5, now).unwrap();
        let s = QuizSession::start(&user(), Category::TypeScript, &qs, now)
            .unwrap()
            .with_answer(&a, 3)
            .unwrap();

        let json = serde_json::to_value(s.to_props()).unwrap();
        let back: QuizSessionProps = serde_json::from_value(json).unwrap();
        assert_eq!(QuizSession::create(back).unwrap(), s);
    }
}
