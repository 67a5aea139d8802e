//! Identity resolution: turning provider claims into a usable `User` right away
//! and enriching it from the profile store in the background.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use async_trait::async_trait;
use quiz_core::Clock;
use quiz_core::model::{User, UserId, UserProps};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::IdentityError;
use crate::quiz::{ProfileSync, SyncStatus, SyncedUser, UserStore};

pub const ANONYMOUS_NAME: &str = "Anonymous";

/// What an identity provider knows about a signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    EmailPassword { email: String, password: String },
    /// Hand-off to an external account (popup/redirect). The user may back out.
    Federated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn(IdentityClaims),
    /// The user dismissed the flow. Not an error.
    Cancelled,
}

pub type IdentityCallback = Arc<dyn Fn(Option<IdentityClaims>) + Send + Sync>;

/// Keeps an identity subscription alive; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidCredentials` or a provider failure.
    async fn sign_in(&self, credentials: Credentials) -> Result<SignInOutcome, IdentityError>;

    /// Create an account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::EmailInUse` or a provider failure.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<IdentityClaims, IdentityError>;

    /// # Errors
    ///
    /// Returns a provider failure.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Call `callback` with the current identity now and on every change.
    fn subscribe(&self, callback: IdentityCallback) -> Subscription;
}

/// A freshly resolved user plus the background enrichment settling it.
#[derive(Debug)]
pub struct SignedInUser {
    pub user: User,
    pub enrichment: JoinHandle<SyncStatus>,
}

/// Settled status of each running enrichment, `None` until it finishes.
type InFlight = Arc<Mutex<HashMap<UserId, watch::Receiver<Option<SyncStatus>>>>>;

/// Signs users in and keeps `UserStore` in step with the identity provider.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    profiles: ProfileSync,
    users: UserStore,
    clock: Clock,
    enriching: InFlight,
}

impl AuthService {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        profiles: ProfileSync,
        users: UserStore,
        clock: Clock,
    ) -> Self {
        Self {
            provider,
            profiles,
            users,
            clock,
            enriching: InFlight::default(),
        }
    }

    #[must_use]
    pub fn users(&self) -> &UserStore {
        &self.users
    }

    /// Build a local user straight from `claims`: level 1, no XP, created now.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::User` if the claims do not form a valid user.
    pub fn resolve(&self, claims: &IdentityClaims) -> Result<User, IdentityError> {
        let display_name = claims
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_NAME)
            .to_owned();
        Ok(User::create(UserProps {
            id: claims.id.clone(),
            email: claims.email.clone(),
            display_name,
            photo_url: claims.photo_url.clone(),
            created_at: self.clock.now(),
            level: 1,
            xp: 0,
        })?)
    }

    /// Sign in and return the resolved user immediately. `Ok(None)` means the
    /// user cancelled.
    ///
    /// # Errors
    ///
    /// Returns provider failures and invalid claims. Enrichment never fails this call.
    pub async fn sign_in(
        &self,
        credentials: Credentials,
    ) -> Result<Option<SignedInUser>, IdentityError> {
        match self.provider.sign_in(credentials).await? {
            SignInOutcome::Cancelled => {
                info!("sign-in cancelled");
                Ok(None)
            }
            SignInOutcome::SignedIn(claims) => {
                // A running identity watcher may already have resolved this user.
                let pending = self.users.current().filter(|current| {
                    current.status == SyncStatus::Pending && current.user.id().as_str() == claims.id
                });
                let user = match pending {
                    Some(current) => current.user,
                    None => {
                        let user = self.resolve(&claims)?;
                        self.users.set(SyncedUser::pending(user.clone()));
                        user
                    }
                };
                info!(user_id = %user.id(), "signed in");
                let enrichment = self.enrich_once(&Handle::current(), user.clone());
                Ok(Some(SignedInUser { user, enrichment }))
            }
        }
    }

    /// Create an account, then save its profile in the background.
    ///
    /// # Errors
    ///
    /// Returns provider failures and invalid claims.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignedInUser, IdentityError> {
        let claims = self.provider.sign_up(email, password, display_name).await?;
        let user = self.resolve(&claims)?;
        info!(user_id = %user.id(), "account created");
        self.users.set(SyncedUser::pending(user.clone()));

        let profiles = self.profiles.clone();
        let users = self.users.clone();
        let created = user.clone();
        let enrichment = tokio::spawn(async move {
            let landed = profiles.save(&created).await;
            settle(&users, &created, landed)
        });
        Ok(SignedInUser { user, enrichment })
    }

    /// # Errors
    ///
    /// Returns provider failures; the local user is kept in that case.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        self.provider.sign_out().await?;
        self.users.clear();
        info!("signed out");
        Ok(())
    }

    /// Mirror provider identity changes into `UserStore` until the returned
    /// subscription is dropped. Enrichment needs a tokio runtime; without one the
    /// resolved user is kept as pending.
    pub fn watch_identity(&self) -> Subscription {
        let auth = self.clone();
        self.provider.subscribe(Arc::new(move |claims: Option<IdentityClaims>| match claims {
            None => auth.users.clear(),
            Some(claims) => {
                if auth.users.user().is_some_and(|u| u.id().as_str() == claims.id) {
                    return;
                }
                let user = match auth.resolve(&claims) {
                    Ok(user) => user,
                    Err(e) => {
                        warn!(error = %e, "identity claims rejected");
                        return;
                    }
                };
                auth.users.set(SyncedUser::pending(user.clone()));
                match Handle::try_current() {
                    Ok(handle) => {
                        drop(auth.enrich_once(&handle, user));
                    }
                    Err(_) => warn!(user_id = %user.id(), "no runtime, skipping profile enrichment"),
                }
            }
        }))
    }

    /// Re-read the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Sync` once the bounded retry is spent.
    pub async fn refresh_user(&self) -> Result<Option<User>, IdentityError> {
        let Some(local) = self.users.user() else {
            return Ok(None);
        };
        match self.profiles.fetch(local.id()).await? {
            Some(remote) => {
                let refreshed = with_stored_progress(&local, &remote)?;
                self.users.set(SyncedUser::confirmed(refreshed.clone()));
                Ok(Some(refreshed))
            }
            None => Ok(Some(local)),
        }
    }

    /// Start enriching `user` unless an enrichment for the same id is already
    /// running, in which case the handle waits for that one instead.
    fn enrich_once(&self, handle: &Handle, user: User) -> JoinHandle<SyncStatus> {
        let mut enriching = self
            .enriching
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = enriching
            .get(user.id())
            .filter(|rx| rx.borrow().is_none())
            .cloned()
        {
            debug!(user_id = %user.id(), "joining running profile enrichment");
            return handle.spawn(async move {
                let mut running = running;
                running
                    .wait_for(Option::is_some)
                    .await
                    .ok()
                    .and_then(|status| *status)
                    .unwrap_or(SyncStatus::FailedKeptLocally)
            });
        }

        let (tx, rx) = watch::channel(None);
        let mine = rx.clone();
        enriching.insert(user.id().clone(), rx);
        drop(enriching);

        let auth = self.clone();
        handle.spawn(async move {
            let id = user.id().clone();
            let status = auth.clone().enrich(user).await;
            tx.send_replace(Some(status));
            let mut enriching = auth.enriching.lock().unwrap_or_else(PoisonError::into_inner);
            if enriching.get(&id).is_some_and(|rx| rx.same_channel(&mine)) {
                enriching.remove(&id);
            }
            status
        })
    }

    /// Pull stored progress into the locally resolved `user`. Absent profiles are
    /// created. Read failures leave the defaults in place.
    async fn enrich(self, user: User) -> SyncStatus {
        match self.profiles.fetch(user.id()).await {
            Ok(Some(remote)) => match with_stored_progress(&user, &remote) {
                Ok(enriched) => {
                    debug!(user_id = %user.id(), xp = enriched.xp(), "profile enriched");
                    self.users.replace(&user, SyncedUser::confirmed(enriched));
                    SyncStatus::Confirmed
                }
                Err(e) => {
                    warn!(user_id = %user.id(), error = %e, "stored profile unusable");
                    settle(&self.users, &user, false)
                }
            },
            Ok(None) => {
                let landed = self.profiles.save(&user).await;
                settle(&self.users, &user, landed)
            }
            Err(e) => {
                warn!(
                    user_id = %user.id(),
                    error = %e,
                    "profile read failed, keeping defaults"
                );
                settle(&self.users, &user, false)
            }
        }
    }
}

/// Identity fields from `local`, progress and creation time from `stored`.
fn with_stored_progress(local: &User, stored: &User) -> Result<User, IdentityError> {
    Ok(User::create(UserProps {
        created_at: stored.created_at(),
        level: stored.level(),
        xp: stored.xp(),
        ..local.to_props()
    })?)
}

fn settle(users: &UserStore, user: &User, landed: bool) -> SyncStatus {
    users.resolve(user, landed).unwrap_or(if landed {
        SyncStatus::Confirmed
    } else {
        SyncStatus::FailedKeptLocally
    })
}

// ─── In-process provider ───────────────────────────────────────────────────

struct Account {
    password: String,
    claims: IdentityClaims,
}

#[derive(Default)]
struct LocalState {
    accounts: HashMap<String, Account>,
    current: Option<IdentityClaims>,
    federated: Option<IdentityClaims>,
    subscribers: Vec<(u64, IdentityCallback)>,
    next_subscriber: u64,
    next_account: u64,
}

/// Email/password accounts kept in memory, for the CLI and tests.
#[derive(Clone, Default)]
pub struct LocalIdentity {
    state: Arc<Mutex<LocalState>>,
}

impl LocalIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Federated sign-in succeeds with `claims` instead of being cancelled.
    #[must_use]
    pub fn with_federated(self, claims: IdentityClaims) -> Self {
        self.lock().federated = Some(claims);
        self
    }

    #[must_use]
    pub fn current(&self) -> Option<IdentityClaims> {
        self.lock().current.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn switch_to(&self, identity: Option<IdentityClaims>) {
        let callbacks: Vec<IdentityCallback> = {
            let mut state = self.lock();
            state.current.clone_from(&identity);
            state.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };
        for callback in callbacks {
            callback(identity.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, credentials: Credentials) -> Result<SignInOutcome, IdentityError> {
        let claims = match credentials {
            Credentials::EmailPassword { email, password } => {
                let state = self.lock();
                match state.accounts.get(&email.to_lowercase()) {
                    Some(account) if account.password == password => account.claims.clone(),
                    _ => return Err(IdentityError::InvalidCredentials),
                }
            }
            Credentials::Federated => match self.lock().federated.clone() {
                Some(claims) => claims,
                None => return Ok(SignInOutcome::Cancelled),
            },
        };
        self.switch_to(Some(claims.clone()));
        Ok(SignInOutcome::SignedIn(claims))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<IdentityClaims, IdentityError> {
        let claims = {
            let mut state = self.lock();
            let key = email.to_lowercase();
            if state.accounts.contains_key(&key) {
                return Err(IdentityError::EmailInUse(email.to_owned()));
            }
            state.next_account += 1;
            let claims = IdentityClaims {
                id: format!("local-{}", state.next_account),
                email: email.to_owned(),
                display_name: Some(display_name.trim().to_owned()).filter(|n| !n.is_empty()),
                photo_url: None,
            };
            state.accounts.insert(
                key,
                Account {
                    password: password.to_owned(),
                    claims: claims.clone(),
                },
            );
            claims
        };
        self.switch_to(Some(claims.clone()));
        Ok(claims)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.switch_to(None);
        Ok(())
    }

    fn subscribe(&self, callback: IdentityCallback) -> Subscription {
        let (id, current) = {
            let mut state = self.lock();
            state.next_subscriber += 1;
            let id = state.next_subscriber;
            state.subscribers.push((id, callback.clone()));
            (id, state.current.clone())
        };
        callback(current);

        let weak: Weak<Mutex<LocalState>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = weak.upgrade() {
                state
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .retain(|(sid, _)| *sid != id);
            }
        })
    }
}
