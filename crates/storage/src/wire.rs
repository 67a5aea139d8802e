//! Document shapes exchanged with the remote store, and their converters.
//!
//! Documents are keyed externally, so none of them carry their own id. Every
//! `into_*` conversion runs the entity factory; a document that violates an
//! entity invariant is rejected here as `StorageError::InvalidDocument`.

use chrono::{DateTime, Utc};
use quiz_core::model::{
    Answer, AnswerChoice, AnswerProps, Category, QuizSession, QuizSessionProps, SessionId, User,
    UserId, UserProps,
};
use serde::{Deserialize, Serialize};

use crate::repository::StorageError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerDocument {
    pub question_id: String,
    pub user_answer: AnswerChoice,
    pub is_correct: bool,
    pub time_spent: f64,
    pub answered_at: DateTime<Utc>,
}

impl AnswerDocument {
    #[must_use]
    pub fn from_answer(answer: &Answer) -> Self {
        let props = answer.to_props();
        Self {
            question_id: props.question_id,
            user_answer: props.user_answer,
            is_correct: props.is_correct,
            time_spent: props.time_spent,
            answered_at: props.answered_at,
        }
    }

    fn into_props(self) -> AnswerProps {
        AnswerProps {
            question_id: self.question_id,
            user_answer: self.user_answer,
            is_correct: self.is_correct,
            time_spent: self.time_spent,
            answered_at: self.answered_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    pub user_id: String,
    pub category: Category,
    pub question_ids: Vec<String>,
    #[serde(default)]
    pub answers: Vec<AnswerDocument>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub total_score: u32,
    pub max_score: u32,
}

impl SessionDocument {
    #[must_use]
    pub fn from_session(session: &QuizSession) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            category: session.category().clone(),
            question_ids: session
                .question_ids()
                .iter()
                .map(ToString::to_string)
                .collect(),
            answers: session
                .answers()
                .iter()
                .map(AnswerDocument::from_answer)
                .collect(),
            started_at: session.started_at(),
            completed_at: session.completed_at(),
            total_score: session.total_score(),
            max_score: session.max_score(),
        }
    }

    /// Rebuild the session stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDocument` if the document fails session validation.
    pub fn into_session(self, id: &SessionId) -> Result<QuizSession, StorageError> {
        QuizSession::create(QuizSessionProps {
            id: id.to_string(),
            user_id: self.user_id,
            category: self.category,
            question_ids: self.question_ids,
            answers: self
                .answers
                .into_iter()
                .map(AnswerDocument::into_props)
                .collect(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            total_score: self.total_score,
            max_score: self.max_score,
        })
        .map_err(|e| StorageError::InvalidDocument(format!("session {id}: {e}")))
    }
}

/// User profile document. Progress fields may be absent on documents written
/// before the first completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub xp: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserDocument {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            email: user.email().to_owned(),
            display_name: user.display_name().to_owned(),
            photo_url: user.photo_url().map(ToOwned::to_owned),
            level: Some(user.level()),
            xp: Some(user.xp()),
            created_at: Some(user.created_at()),
        }
    }

    /// Rebuild the user stored under `id`. Missing level/xp default to 1/0 and a
    /// missing creation time defaults to `read_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDocument` if the document fails user validation.
    pub fn into_user(self, id: &UserId, read_at: DateTime<Utc>) -> Result<User, StorageError> {
        User::create(UserProps {
            id: id.to_string(),
            email: self.email,
            display_name: self.display_name,
            photo_url: self.photo_url,
            created_at: self.created_at.unwrap_or(read_at),
            level: self.level.unwrap_or(1),
            xp: self.xp.unwrap_or(0),
        })
        .map_err(|e| StorageError::InvalidDocument(format!("user {id}: {e}")))
    }

    /// Apply a merge-upsert of `incoming` onto this stored document.
    ///
    /// Every field present on `incoming` wins, except `createdAt`, which is only
    /// filled in when the stored document has none.
    pub fn merge(&mut self, incoming: UserDocument) {
        self.email = incoming.email;
        self.display_name = incoming.display_name;
        if incoming.photo_url.is_some() {
            self.photo_url = incoming.photo_url;
        }
        if incoming.level.is_some() {
            self.level = incoming.level;
        }
        if incoming.xp.is_some() {
            self.xp = incoming.xp;
        }
        if self.created_at.is_none() {
            self.created_at = incoming.created_at;
        }
    }
}
