use std::sync::Arc;

use quiz_core::model::{QuizSession, SessionId, User, UserId};
use storage::repository::{SessionRepository, StorageError, UserRepository};
use tracing::{debug, error, info};

use crate::error::SyncError;
use crate::retry::RetryPolicy;

// ─── Sessions ──────────────────────────────────────────────────────────────

/// Session persistence with the write/read failure semantics the quiz flow relies on.
///
/// Creating a completed session is best-effort: failures are logged and
/// swallowed. Updates and deletes report typed failures. Reads retry transient
/// errors under the configured policy.
#[derive(Clone)]
pub struct SessionSync {
    sessions: Arc<dyn SessionRepository>,
    retry: RetryPolicy,
}

impl SessionSync {
    #[must_use]
    pub fn new(sessions: Arc<dyn SessionRepository>, retry: RetryPolicy) -> Self {
        Self { sessions, retry }
    }

    /// Persist a finished session. Returns whether the write landed.
    pub async fn record_completed(&self, session: &QuizSession) -> bool {
        match self.sessions.create_session(session).await {
            Ok(()) => {
                info!(
                    session_id = %session.id(),
                    total_score = session.total_score(),
                    "session saved"
                );
                true
            }
            Err(e) => {
                error!(session_id = %session.id(), error = %e, "failed to save session");
                false
            }
        }
    }

    /// # Errors
    ///
    /// Returns `SyncError::Storage(NotFound)` if the session was never saved,
    /// or any other storage failure.
    pub async fn update(&self, session: &QuizSession) -> Result<(), SyncError> {
        self.sessions.update_session(session).await?;
        debug!(session_id = %session.id(), "session updated");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SyncError::Storage(NotFound)` if no such session exists.
    pub async fn delete(&self, id: &SessionId) -> Result<(), SyncError> {
        self.sessions.delete_session(id).await?;
        debug!(session_id = %id, "session deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SyncError` once retries are exhausted or on a non-transient failure.
    pub async fn get(&self, id: &SessionId) -> Result<QuizSession, SyncError> {
        self.retry
            .run(
                "get session",
                || async move { Ok::<_, SyncError>(self.sessions.get_session(id).await?) },
                SyncError::is_transient,
            )
            .await
    }

    /// Newest-first sessions for `user_id`, at most `limit` when given.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` once retries are exhausted or on a non-transient failure.
    pub async fn list_recent(
        &self,
        user_id: &UserId,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, SyncError> {
        self.retry
            .run(
                "list sessions",
                || async move {
                    Ok::<_, SyncError>(self.sessions.list_sessions_for_user(user_id, limit).await?)
                },
                SyncError::is_transient,
            )
            .await
    }
}

// ─── Profiles ──────────────────────────────────────────────────────────────

/// User profile reads and merge-upserts.
#[derive(Clone)]
pub struct ProfileSync {
    users: Arc<dyn UserRepository>,
    retry: RetryPolicy,
}

impl ProfileSync {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, retry: RetryPolicy) -> Self {
        Self { users, retry }
    }

    /// Stored profile for `id`, or `None` when none exists yet.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` once retries are exhausted or on a non-transient failure.
    pub async fn fetch(&self, id: &UserId) -> Result<Option<User>, SyncError> {
        self.fetch_with(id, self.retry).await
    }

    /// `fetch` under an explicit retry policy.
    ///
    /// # Errors
    ///
    /// Same as `fetch`.
    pub async fn fetch_with(
        &self,
        id: &UserId,
        retry: RetryPolicy,
    ) -> Result<Option<User>, SyncError> {
        let read = retry
            .run(
                "get user",
                || async move { Ok::<_, SyncError>(self.users.get_user(id).await?) },
                SyncError::is_transient,
            )
            .await;
        match read {
            Ok(user) => Ok(Some(user)),
            Err(SyncError::Storage(StorageError::NotFound)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Merge-upsert `user`. Returns whether the write landed.
    pub async fn save(&self, user: &User) -> bool {
        match self.try_save(user).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id = %user.id(), error = %e, "failed to save user profile");
                false
            }
        }
    }

    /// Merge-upsert `user`, reporting the failure instead of swallowing it.
    ///
    /// # Errors
    ///
    /// Returns the storage failure wrapped in `SyncError`.
    pub async fn try_save(&self, user: &User) -> Result<(), SyncError> {
        self.users.merge_user(user).await?;
        debug!(user_id = %user.id(), xp = user.xp(), level = user.level(), "user profile saved");
        Ok(())
    }
}
