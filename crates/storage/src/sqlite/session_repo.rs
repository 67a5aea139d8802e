use quiz_core::model::{Category, QuizSession, SessionId, UserId};

use super::SqliteRepository;
use super::mapping::{SessionColumns, conn, map_session_row};
use crate::repository::{SessionRepository, StorageError};
use crate::wire::SessionDocument;

const SELECT_SESSION: &str = r"
    SELECT
        id, user_id, category, question_ids, answers,
        started_at, completed_at, total_score, max_score
    FROM quiz_sessions
";

fn sql_limit(limit: Option<u32>) -> i64 {
    // SQLite treats a negative LIMIT as unbounded.
    limit.map_or(-1, i64::from)
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let doc = SessionDocument::from_session(session);
        let cols = SessionColumns::encode(&doc)?;

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (
                    id, user_id, category, question_ids, answers,
                    started_at, completed_at, total_score, max_score
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(session.id().as_str())
        .bind(doc.user_id.as_str())
        .bind(doc.category.as_str())
        .bind(cols.question_ids)
        .bind(cols.answers)
        .bind(doc.started_at)
        .bind(doc.completed_at)
        .bind(i64::from(doc.total_score))
        .bind(i64::from(doc.max_score))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
            other => conn(other),
        })?;

        Ok(())
    }

    async fn update_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let doc = SessionDocument::from_session(session);
        let cols = SessionColumns::encode(&doc)?;

        let res = sqlx::query(
            r"
                UPDATE quiz_sessions SET
                    user_id = ?2,
                    category = ?3,
                    question_ids = ?4,
                    answers = ?5,
                    started_at = ?6,
                    completed_at = ?7,
                    total_score = ?8,
                    max_score = ?9
                WHERE id = ?1
            ",
        )
        .bind(session.id().as_str())
        .bind(doc.user_id.as_str())
        .bind(doc.category.as_str())
        .bind(cols.question_ids)
        .bind(cols.answers)
        .bind(doc.started_at)
        .bind(doc.completed_at)
        .bind(i64::from(doc.total_score))
        .bind(i64::from(doc.max_score))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<QuizSession, StorageError> {
        let sql = format!("{SELECT_SESSION} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError> {
        let sql = format!(
            "{SELECT_SESSION} WHERE user_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn list_sessions_for_user_in_category(
        &self,
        user_id: &UserId,
        category: &Category,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError> {
        let sql = format!(
            "{SELECT_SESSION} WHERE user_id = ?1 AND category = ?2 \
             ORDER BY started_at DESC, id DESC LIMIT ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.as_str())
            .bind(category.as_str())
            .bind(sql_limit(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM quiz_sessions WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
