use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when an identifier is blank.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} cannot be empty")]
pub struct IdError {
    kind: &'static str,
}

impl IdError {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

fn non_empty(kind: &'static str, raw: String) -> Result<String, IdError> {
    if raw.trim().is_empty() {
        return Err(IdError { kind });
    }
    Ok(raw)
}

/// Unique identifier for a User (the identity provider's subject id).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a new `UserId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("user id", id.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a Question in the catalog.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a new `QuestionId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("question id", id.into()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Unique identifier for a QuizSession.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new `SessionId`.
    ///
    /// # Errors
    ///
    /// Returns `IdError` if the id is blank.
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        non_empty("session id", id.into()).map(Self)
    }

    /// Builds the composite `{user}_{unix millis}` id for a session started at `started_at`.
    #[must_use]
    pub fn compose(user_id: &UserId, started_at: DateTime<Utc>) -> Self {
        Self(format!("{}_{}", user_id.0, started_at.timestamp_millis()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ─── Shared Trait Implementations ──────────────────────────────────────────────

macro_rules! string_id_impls {
    ($($name:ident),+ $(,)?) => {
        $(
            impl fmt::Debug for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}({:?})", stringify!($name), self.0)
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl FromStr for $name {
                type Err = IdError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::new(s)
                }
            }

            impl TryFrom<String> for $name {
                type Error = IdError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::new(value)
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl AsRef<str> for $name {
                fn as_ref(&self) -> &str {
                    &self.0
                }
            }
        )+
    };
}

string_id_impls!(UserId, QuestionId, SessionId);

// ─── Tests ─────────────────────────────────────────────────────────────────────
