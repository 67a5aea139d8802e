use std::sync::Arc;

use quiz_core::model::User;
use tokio::sync::watch;
use tracing::debug;

/// Where a locally held user stands relative to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Applied locally; the remote write has not reported back.
    Pending,
    Confirmed,
    /// The remote write failed; the local value is kept anyway.
    FailedKeptLocally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedUser {
    pub user: User,
    pub status: SyncStatus,
}

impl SyncedUser {
    #[must_use]
    pub fn pending(user: User) -> Self {
        Self {
            user,
            status: SyncStatus::Pending,
        }
    }

    #[must_use]
    pub fn confirmed(user: User) -> Self {
        Self {
            user,
            status: SyncStatus::Confirmed,
        }
    }

    /// Settle a pending value once its write reports back.
    #[must_use]
    pub fn resolve(self, landed: bool) -> Self {
        let status = if landed {
            SyncStatus::Confirmed
        } else {
            SyncStatus::FailedKeptLocally
        };
        Self { status, ..self }
    }
}

/// The signed-in user as observable state.
#[derive(Debug, Clone)]
pub struct UserStore {
    tx: Arc<watch::Sender<Option<SyncedUser>>>,
}

impl Default for UserStore {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }
}

impl UserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> Option<SyncedUser> {
        self.tx.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.tx.borrow().as_ref().map(|s| s.user.clone())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<SyncedUser>> {
        self.tx.subscribe()
    }

    pub fn set(&self, value: SyncedUser) {
        debug!(user_id = %value.user.id(), status = ?value.status, "user state updated");
        self.tx.send_replace(Some(value));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Replace the held value with `value` if it still holds `expected`.
    pub fn replace(&self, expected: &User, value: SyncedUser) -> bool {
        self.tx.send_if_modified(|held| match held {
            Some(current) if &current.user == expected => {
                *current = value;
                true
            }
            _ => false,
        })
    }

    /// Settle the held value if it is still exactly `user`. A newer value
    /// (another finish, a sign-out) is left alone. Returns the applied status.
    pub fn resolve(&self, user: &User, landed: bool) -> Option<SyncStatus> {
        let mut applied = None;
        self.tx.send_if_modified(|held| match held {
            Some(current) if &current.user == user => {
                let settled = current.clone().resolve(landed);
                applied = Some(settled.status);
                *current = settled;
                true
            }
            _ => false,
        });
        if applied.is_none() {
            debug!(user_id = %user.id(), "user state moved on, skipping resolution");
        }
        applied
    }
}
