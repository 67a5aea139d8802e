//! The active-quiz state machine as a pure reducer.
//!
//! Every mutation of the current quiz goes through [`reduce`]. Invalid actions
//! never panic or return `Err`; they leave the state as it was and record a
//! [`QuizStateError`] in `state.error` for the caller to inspect.

use chrono::{DateTime, Utc};
use thiserror::Error;

use quiz_core::model::{
    Answer, AnswerChoice, AnswerError, Question, QuestionId, QuizSession, QuizSessionError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizPhase {
    #[default]
    Idle,
    InProgress,
    ReadyToFinish,
    Finishing,
    Completed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizStateError {
    #[error("no quiz is in progress")]
    NoActiveSession,
    #[error("no question at position {index}")]
    InvalidQuestionIndex { index: usize },
    #[error("answer is for question {got}, current question is {expected}")]
    QuestionMismatch { expected: QuestionId, got: QuestionId },
    #[error("quiz still has unanswered questions")]
    NotReadyToFinish,
    #[error(transparent)]
    Rejected(#[from] QuizSessionError),
    #[error(transparent)]
    InvalidAnswer(#[from] AnswerError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuizState {
    pub session: Option<QuizSession>,
    pub questions: Vec<Question>,
    pub current_index: usize,
    pub phase: QuizPhase,
    pub error: Option<QuizStateError>,
}

impl QuizState {
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            QuizPhase::InProgress => self.questions.get(self.current_index),
            _ => None,
        }
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.session.as_ref().map_or(0, QuizSession::total_score)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            QuizPhase::InProgress | QuizPhase::ReadyToFinish | QuizPhase::Finishing
        )
    }

    fn failed(mut self, error: QuizStateError) -> Self {
        self.error = Some(error);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuizAction {
    /// Begin a freshly created session over `questions`.
    Start {
        session: QuizSession,
        questions: Vec<Question>,
    },
    /// Answer the current question. `question_id` is the question the caller
    /// believes is current.
    Answer {
        question_id: QuestionId,
        choice: AnswerChoice,
        time_spent: f64,
        answered_at: DateTime<Utc>,
    },
    /// Stamp the session completed once every question has an answer.
    BeginFinish { completed_at: DateTime<Utc> },
    /// Persistence was initiated and progression applied.
    Finished,
    Reset,
    ClearError,
}

/// Apply `action` to `state`.
#[must_use]
pub fn reduce(state: QuizState, action: QuizAction) -> QuizState {
    match action {
        QuizAction::Start { session, questions } => QuizState {
            session: Some(session),
            questions,
            current_index: 0,
            phase: QuizPhase::InProgress,
            error: None,
        },
        QuizAction::Answer {
            question_id,
            choice,
            time_spent,
            answered_at,
        } => answer(state, question_id, choice, time_spent, answered_at),
        QuizAction::BeginFinish { completed_at } => begin_finish(state, completed_at),
        QuizAction::Finished => {
            if state.phase != QuizPhase::Finishing {
                return state.failed(QuizStateError::NotReadyToFinish);
            }
            QuizState {
                phase: QuizPhase::Completed,
                error: None,
                ..state
            }
        }
        QuizAction::Reset => QuizState::default(),
        QuizAction::ClearError => QuizState {
            error: None,
            ..state
        },
    }
}

fn answer(
    state: QuizState,
    question_id: QuestionId,
    choice: AnswerChoice,
    time_spent: f64,
    answered_at: DateTime<Utc>,
) -> QuizState {
    let Some(session) = state.session.as_ref() else {
        return state.failed(QuizStateError::NoActiveSession);
    };
    if state.phase != QuizPhase::InProgress {
        return state.failed(QuizStateError::NoActiveSession);
    }
    let Some(question) = state.questions.get(state.current_index) else {
        let index = state.current_index;
        return state.failed(QuizStateError::InvalidQuestionIndex { index });
    };
    if question.id() != &question_id {
        let expected = question.id().clone();
        return state.failed(QuizStateError::QuestionMismatch {
            expected,
            got: question_id,
        });
    }

    let answer = match Answer::for_question(question, choice, time_spent, answered_at) {
        Ok(answer) => answer,
        Err(e) => return state.failed(e.into()),
    };
    let points = if answer.is_correct() {
        u32::from(question.weight())
    } else {
        0
    };
    let session = match session.with_answer(&answer, points) {
        Ok(session) => session,
        Err(e) => return state.failed(e.into()),
    };

    let current_index = state.current_index + 1;
    let phase = if current_index >= state.questions.len() {
        QuizPhase::ReadyToFinish
    } else {
        QuizPhase::InProgress
    };
    QuizState {
        session: Some(session),
        current_index,
        phase,
        error: None,
        ..state
    }
}

fn begin_finish(state: QuizState, completed_at: DateTime<Utc>) -> QuizState {
    let Some(session) = state.session.as_ref() else {
        return state.failed(QuizStateError::NoActiveSession);
    };
    if state.phase != QuizPhase::ReadyToFinish {
        return state.failed(QuizStateError::NotReadyToFinish);
    }
    match session.completed(completed_at) {
        Ok(session) => QuizState {
            session: Some(session),
            phase: QuizPhase::Finishing,
            error: None,
            ..state
        },
        Err(e) => state.failed(e.into()),
    }
}
