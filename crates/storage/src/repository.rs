use async_trait::async_trait;
use quiz_core::Clock;
use quiz_core::model::{Category, QuizSession, SessionId, User, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::wire::{SessionDocument, UserDocument};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

/// Quiz session documents, keyed by session id.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a document already exists under the id.
    async fn create_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// Overwrite the fields of an existing session document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no document exists under the id.
    async fn update_session(&self, session: &QuizSession) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or `InvalidDocument` if the
    /// stored document fails validation.
    async fn get_session(&self, id: &SessionId) -> Result<QuizSession, StorageError>;

    /// Sessions owned by `user_id`, newest `startedAt` first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or any document is invalid.
    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError>;

    /// Same as `list_sessions_for_user`, restricted to one category.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails or any document is invalid.
    async fn list_sessions_for_user_in_category(
        &self,
        user_id: &UserId,
        category: &Category,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no document exists under the id.
    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError>;
}

/// User profile documents, keyed by user id.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or `InvalidDocument` if the
    /// stored document fails validation.
    async fn get_user(&self, id: &UserId) -> Result<User, StorageError>;

    /// Merge-upsert: insert when absent, otherwise overwrite profile and progress
    /// fields while keeping the stored `createdAt`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn merge_user(&self, user: &User) -> Result<(), StorageError>;
}

/// In-memory document store for testing and the offline CLI.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, SessionDocument>>>,
    users: Arc<Mutex<HashMap<UserId, UserDocument>>>,
    clock: Clock,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository whose reads stamp missing creation times with `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Place a raw user document, bypassing entity validation.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_user_document(&self, id: UserId, doc: UserDocument) -> Result<(), StorageError> {
        let mut guard = self
            .users
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(id, doc);
        Ok(())
    }

    /// Raw stored user document, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn user_document(&self, id: &UserId) -> Result<Option<UserDocument>, StorageError> {
        let guard = self
            .users
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(id).cloned())
    }

    fn list_matching(
        &self,
        user_id: &UserId,
        category: Option<&Category>,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut matching: Vec<(&SessionId, &SessionDocument)> = guard
            .iter()
            .filter(|(_, doc)| doc.user_id == user_id.as_str())
            .filter(|(_, doc)| category.is_none_or(|c| &doc.category == c))
            .collect();
        matching.sort_by(|(a_id, a), (b_id, b)| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| b_id.as_str().cmp(a_id.as_str()))
        });

        let cap = limit.map_or(usize::MAX, |l| l as usize);
        matching
            .into_iter()
            .take(cap)
            .map(|(id, doc)| doc.clone().into_session(id))
            .collect()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(session.id()) {
            return Err(StorageError::Conflict);
        }
        guard.insert(session.id().clone(), SessionDocument::from_session(session));
        Ok(())
    }

    async fn update_session(&self, session: &QuizSession) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard.get_mut(session.id()).ok_or(StorageError::NotFound)?;
        *slot = SessionDocument::from_session(session);
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<QuizSession, StorageError> {
        let doc = {
            let guard = self
                .sessions
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            guard.get(id).cloned().ok_or(StorageError::NotFound)?
        };
        doc.into_session(id)
    }

    async fn list_sessions_for_user(
        &self,
        user_id: &UserId,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError> {
        self.list_matching(user_id, None, limit)
    }

    async fn list_sessions_for_user_in_category(
        &self,
        user_id: &UserId,
        category: &Category,
        limit: Option<u32>,
    ) -> Result<Vec<QuizSession>, StorageError> {
        self.list_matching(user_id, Some(category), limit)
    }

    async fn delete_session(&self, id: &SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(id).map(|_| ()).ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn get_user(&self, id: &UserId) -> Result<User, StorageError> {
        let doc = self.user_document(id)?.ok_or(StorageError::NotFound)?;
        doc.into_user(id, self.clock.now())
    }

    async fn merge_user(&self, user: &User) -> Result<(), StorageError> {
        let incoming = UserDocument::from_user(user);
        let mut guard = self
            .users
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        match guard.get_mut(user.id()) {
            Some(stored) => stored.merge(incoming),
            None => {
                guard.insert(user.id().clone(), incoming);
            }
        }
        Ok(())
    }
}

/// Session and user repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Bundle an existing in-memory repository, keeping a handle for seeding.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let users: Arc<dyn UserRepository> = Arc::new(repo);
        Self { sessions, users }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use quiz_core::model::{
        AnswerChoice, Difficulty, Question, QuestionProps, QuestionType, UserProps,
    };
    use quiz_core::time::fixed_now;

    fn questions() -> Vec<Question> {
        ["q1", "q2"]
            .into_iter()
            .map(|id| {
                Question::create(QuestionProps {
                    id: id.to_owned(),
                    category: Category::Css,
                    difficulty: Difficulty::Junior,
                    kind: QuestionType::MultipleChoice,
                    question: "Which property sets stacking order?".to_owned(),
                    code: None,
                    options: vec!["z-index".to_owned(), "order".to_owned()],
                    correct_answer: AnswerChoice::Single(0),
                    explanation: "z-index controls stacking.".to_owned(),
                    tags: Vec::new(),
                    weight: 2,
                })
                .unwrap()
            })
            .collect()
    }

    fn session(user: &str, category: Category, minutes_ago: i64) -> QuizSession {
        QuizSession::start(
            &UserId::new(user).unwrap(),
            category,
            &questions(),
            fixed_now() - Duration::minutes(minutes_ago),
        )
        .unwrap()
    }

    fn user(xp: u64) -> User {
        User::create(UserProps {
            id: "u1".to_owned(),
            email: "u1@example.com".to_owned(),
            display_name: "U One".to_owned(),
            photo_url: None,
            created_at: fixed_now(),
            level: 1,
            xp,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemoryRepository::new();
        let s = session("u1", Category::Css, 0);
        repo.create_session(&s).await.unwrap();
        assert_eq!(repo.get_session(s.id()).await.unwrap(), s);
    }

    #[tokio::test]
    async fn create_twice_conflicts() {
        let repo = InMemoryRepository::new();
        let s = session("u1", Category::Css, 0);
        repo.create_session(&s).await.unwrap();
        let err = repo.create_session(&s).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_document() {
        let repo = InMemoryRepository::new();
        let s = session("u1", Category::Css, 0);
        assert!(matches!(
            repo.update_session(&s).await,
            Err(StorageError::NotFound)
        ));
        assert!(matches!(
            repo.delete_session(s.id()).await,
            Err(StorageError::NotFound)
        ));

        repo.create_session(&s).await.unwrap();
        let done = s.completed(fixed_now()).unwrap();
        repo.update_session(&done).await.unwrap();
        assert_eq!(
            repo.get_session(s.id()).await.unwrap().completed_at(),
            Some(fixed_now())
        );
        repo.delete_session(s.id()).await.unwrap();
        assert!(matches!(
            repo.get_session(s.id()).await,
            Err(StorageError::NotFound)
        ));
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_limits() {
        let repo = InMemoryRepository::new();
        for minutes_ago in [30, 10, 20] {
            repo.create_session(&session("u1", Category::Css, minutes_ago))
                .await
                .unwrap();
        }
        repo.create_session(&session("u2", Category::Css, 0))
            .await
            .unwrap();
        repo.create_session(&session("u1", Category::React, 5))
            .await
            .unwrap();

        let owner = UserId::new("u1").unwrap();
        let all = repo.list_sessions_for_user(&owner, None).await.unwrap();
        let starts: Vec<_> = all.iter().map(QuizSession::started_at).collect();
        let mut sorted = starts.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(all.len(), 4);
        assert_eq!(starts, sorted);

        let two = repo.list_sessions_for_user(&owner, Some(2)).await.unwrap();
        assert_eq!(two.len(), 2);
        assert_eq!(two[0].category(), &Category::React);

        let css = repo
            .list_sessions_for_user_in_category(&owner, &Category::Css, None)
            .await
            .unwrap();
        assert_eq!(css.len(), 3);
    }

    #[tokio::test]
    async fn merge_user_is_idempotent_and_keeps_created_at() {
        let repo = InMemoryRepository::new();
        let first = user(0);
        repo.merge_user(&first).await.unwrap();

        let later = User::create(UserProps {
            created_at: fixed_now() + Duration::days(9),
            ..user(1_200).with_progress(1_200, 2).unwrap().to_props()
        })
        .unwrap();
        repo.merge_user(&later).await.unwrap();
        let once = repo.user_document(first.id()).unwrap();
        repo.merge_user(&later).await.unwrap();
        let twice = repo.user_document(first.id()).unwrap();

        assert_eq!(once, twice);
        let stored = repo.get_user(first.id()).await.unwrap();
        assert_eq!(stored.xp(), 1_200);
        assert_eq!(stored.level(), 2);
        assert_eq!(stored.created_at(), fixed_now());
    }

    #[tokio::test]
    async fn missing_created_at_uses_repository_clock() {
        let at = fixed_now() + Duration::hours(1);
        let repo = InMemoryRepository::with_clock(Clock::fixed(at));
        let id = UserId::new("legacy").unwrap();
        repo.put_user_document(
            id.clone(),
            UserDocument {
                email: "legacy@example.com".to_owned(),
                display_name: "Legacy".to_owned(),
                photo_url: None,
                level: None,
                xp: None,
                created_at: None,
            },
        )
        .unwrap();

        let user = repo.get_user(&id).await.unwrap();
        assert_eq!(user.created_at(), at);
        assert_eq!(user.level(), 1);
    }
}
