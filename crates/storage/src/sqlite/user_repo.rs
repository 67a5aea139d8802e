use quiz_core::model::{User, UserId};

use super::SqliteRepository;
use super::mapping::{conn, i64_from_u64, map_user_row};
use crate::repository::{StorageError, UserRepository};

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn get_user(&self, id: &UserId) -> Result<User, StorageError> {
        let row = sqlx::query(
            r"
                SELECT email, display_name, photo_url, level, xp, created_at
                FROM users
                WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_user_row(&row, id, self.clock.now())
    }

    async fn merge_user(&self, user: &User) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO users (id, email, display_name, photo_url, level, xp, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ON CONFLICT(id) DO UPDATE SET
                    email = excluded.email,
                    display_name = excluded.display_name,
                    photo_url = COALESCE(excluded.photo_url, users.photo_url),
                    level = excluded.level,
                    xp = excluded.xp
            ",
        )
        .bind(user.id().as_str())
        .bind(user.email())
        .bind(user.display_name())
        .bind(user.photo_url())
        .bind(i64::from(user.level()))
        .bind(i64_from_u64("xp", user.xp())?)
        .bind(user.created_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
