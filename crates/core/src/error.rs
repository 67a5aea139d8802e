use thiserror::Error;

use crate::model::{AnswerError, IdError, QuestionError, QuizSessionError, UserError};

/// Any entity validation failure raised by the domain layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Session(#[from] QuizSessionError),
    #[error(transparent)]
    User(#[from] UserError),
}
