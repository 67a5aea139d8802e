mod answer;
mod ids;
mod question;
mod session;
mod user;

pub use ids::{IdError, QuestionId, SessionId, UserId};

pub use answer::{Answer, AnswerError, AnswerProps};
pub use question::{
    AnswerChoice, Category, Difficulty, MAX_WEIGHT, MIN_WEIGHT, Question, QuestionError,
    QuestionProps, QuestionType,
};
pub use session::{QuizSession, QuizSessionError, QuizSessionProps};
pub use user::{Rank, User, UserError, UserProps};
