use std::sync::Arc;

use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::catalog::QuestionCatalog;
use crate::config::SyncConfig;
use crate::error::AppServicesError;
use crate::identity::{AuthService, IdentityProvider};
use crate::quiz::{ProfileSync, QuizFlowService, SessionSync, UserStore};
use crate::stats::StatsService;
use crate::tasks::{TaskLog, ViewScope};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    config: SyncConfig,
    catalog: Arc<QuestionCatalog>,
    users: UserStore,
    session_sync: SessionSync,
    profile_sync: ProfileSync,
    quiz: Arc<QuizFlowService>,
    stats: Arc<StatsService>,
    auth: AuthService,
    task_log: TaskLog,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: SyncConfig,
        catalog: QuestionCatalog,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        info!(db_url, "sqlite storage ready");
        Ok(Self::from_storage(storage, clock, config, catalog, identity))
    }

    /// Build services over fresh in-memory repositories.
    #[must_use]
    pub fn in_memory(
        clock: Clock,
        config: SyncConfig,
        catalog: QuestionCatalog,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::from_storage(Storage::in_memory(), clock, config, catalog, identity)
    }

    #[must_use]
    pub fn from_storage(
        storage: Storage,
        clock: Clock,
        config: SyncConfig,
        catalog: QuestionCatalog,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let users = UserStore::new();
        let session_sync = SessionSync::new(Arc::clone(&storage.sessions), config.retry);
        let profile_sync = ProfileSync::new(Arc::clone(&storage.users), config.retry);

        let quiz = Arc::new(QuizFlowService::new(
            clock,
            Arc::clone(&catalog),
            session_sync.clone(),
            profile_sync.clone(),
            users.clone(),
            config.question_count,
        ));
        let stats = Arc::new(StatsService::new(
            session_sync.clone(),
            Arc::clone(&catalog),
            clock,
            config.recent_sessions,
            config.challenge.clone(),
        ));
        let auth = AuthService::new(identity, profile_sync.clone(), users.clone(), clock);

        Self {
            clock,
            config,
            catalog,
            users,
            session_sync,
            profile_sync,
            quiz,
            stats,
            auth,
            task_log: TaskLog::new(),
        }
    }

    /// A scope for one view, reporting into the shared task log.
    #[must_use]
    pub fn view_scope(&self) -> ViewScope {
        ViewScope::new(self.task_log.clone())
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<QuestionCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    #[must_use]
    pub fn session_sync(&self) -> &SessionSync {
        &self.session_sync
    }

    #[must_use]
    pub fn profile_sync(&self) -> &ProfileSync {
        &self.profile_sync
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizFlowService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn stats(&self) -> Arc<StatsService> {
        Arc::clone(&self.stats)
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub fn task_log(&self) -> &TaskLog {
        &self.task_log
    }
}
