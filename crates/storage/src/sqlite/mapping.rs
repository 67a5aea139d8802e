use chrono::{DateTime, Utc};
use quiz_core::model::{Category, QuizSession, SessionId, User, UserId};
use sqlx::Row;

use crate::repository::StorageError;
use crate::wire::{AnswerDocument, SessionDocument, UserDocument};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn i64_from_u64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

/// JSON-encoded columns for the repeated session fields.
pub(crate) struct SessionColumns {
    pub question_ids: String,
    pub answers: String,
}

impl SessionColumns {
    pub(crate) fn encode(doc: &SessionDocument) -> Result<Self, StorageError> {
        Ok(Self {
            question_ids: serde_json::to_string(&doc.question_ids).map_err(ser)?,
            answers: serde_json::to_string(&doc.answers).map_err(ser)?,
        })
    }
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<QuizSession, StorageError> {
    let raw_id: String = row.try_get("id").map_err(ser)?;
    let id = SessionId::new(raw_id).map_err(|e| StorageError::InvalidDocument(e.to_string()))?;

    let question_ids: Vec<String> =
        serde_json::from_str(&row.try_get::<String, _>("question_ids").map_err(ser)?)
            .map_err(ser)?;
    let answers: Vec<AnswerDocument> =
        serde_json::from_str(&row.try_get::<String, _>("answers").map_err(ser)?).map_err(ser)?;
    let category: String = row.try_get("category").map_err(ser)?;
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;

    let doc = SessionDocument {
        user_id: row.try_get("user_id").map_err(ser)?,
        category: Category::parse(&category),
        question_ids,
        answers,
        started_at,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        total_score: u32_from_i64("total_score", row.try_get("total_score").map_err(ser)?)?,
        max_score: u32_from_i64("max_score", row.try_get("max_score").map_err(ser)?)?,
    };
    doc.into_session(&id)
}

pub(crate) fn map_user_row(
    row: &sqlx::sqlite::SqliteRow,
    id: &UserId,
    read_at: DateTime<Utc>,
) -> Result<User, StorageError> {
    let doc = UserDocument {
        email: row.try_get("email").map_err(ser)?,
        display_name: row.try_get("display_name").map_err(ser)?,
        photo_url: row.try_get("photo_url").map_err(ser)?,
        level: Some(u32_from_i64("level", row.try_get("level").map_err(ser)?)?),
        xp: Some(u64_from_i64("xp", row.try_get("xp").map_err(ser)?)?),
        created_at: row.try_get("created_at").map_err(ser)?,
    };
    doc.into_user(id, read_at)
}
