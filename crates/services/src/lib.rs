#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod quiz;
pub mod retry;
pub mod stats;
pub mod tasks;

#[cfg(test)]
mod test_support;

pub use quiz_core::Clock;

pub use app_services::AppServices;
pub use catalog::{QuestionCatalog, QuestionFilter, fisher_yates};
pub use config::SyncConfig;
pub use error::{AppServicesError, CatalogError, ConfigError, FlowError, IdentityError, SyncError};
pub use identity::{
    AuthService, Credentials, IdentityClaims, IdentityProvider, LocalIdentity, SignInOutcome,
    SignedInUser, Subscription,
};
pub use quiz::{
    FinishReport, ProfileSync, QuizAction, QuizFlowService, QuizPhase, QuizState, QuizStateError,
    SessionSync, SyncStatus, SyncedUser, UserStore,
};
pub use retry::RetryPolicy;
pub use stats::{ChallengeConfig, DashboardStats, StatsService, WeeklyChallenge};
pub use tasks::{TaskLog, TaskOutcome, ViewScope};
