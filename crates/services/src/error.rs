//! Shared error types for the services crate.

use std::path::PathBuf;

use thiserror::Error;

use quiz_core::model::{Category, IdError, QuestionError, QuizSessionError, UserError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading a question corpus.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("corpus is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("question {id:?} at position {index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        id: String,
        #[source]
        source: QuestionError,
    },
    #[error("duplicate question id {0:?}")]
    DuplicateId(String),
    #[error("failed to read corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors emitted while reading configuration from the environment.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Errors emitted by the session/profile sync layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Domain(#[from] quiz_core::Error),
}

impl SyncError {
    /// Whether retrying the same read may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Storage(StorageError::Connection(_)))
    }
}

/// Errors emitted when starting a quiz.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlowError {
    #[error("no questions available for category {0}")]
    NoQuestions(Category),
    #[error(transparent)]
    Session(#[from] QuizSessionError),
}

/// Errors emitted by identity providers and `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account already exists for {0}")]
    EmailInUse(String),
    #[error("identity provider failed: {0}")]
    Provider(String),
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
