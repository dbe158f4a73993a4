//! Sync coordinator
//!
//! Every client operation goes to the remote content service first. When the
//! service cannot be reached the operation is applied to the in-memory state
//! instead, and either way the state is then written to the local store so
//! the next session can start from it.
//!
//! Local writes are never replayed to the remote service once it comes back.
//! A rejection from the service (any 4xx) is final and never triggers the
//! local path.
//!
//! Operations describe themselves through [`Mutation`] and [`Query`]; the
//! coordinator owns the remote/local decision, the state lock and
//! persistence.

mod error;
mod state;

pub use error::SyncError;
pub use state::{Collection, SessionState, Snapshot};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

use crate::cache::{KeyValueStore, LocalStore};
use crate::models::{Article, Notification, User};
use crate::remote::{RemoteContentService, RemoteError, RemoteResult};

/// Where an operation's result came from
#[derive(Debug, Clone, PartialEq)]
pub enum Synced<T> {
    /// Confirmed by the remote service
    Remote(T),
    /// Applied to local data only
    Local(T),
}

impl<T> Synced<T> {
    pub fn is_local(&self) -> bool {
        matches!(self, Synced::Local(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Synced::Remote(value) | Synced::Local(value) => value,
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Synced::Remote(value) | Synced::Local(value) => value,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Synced<U> {
        match self {
            Synced::Remote(value) => Synced::Remote(f(value)),
            Synced::Local(value) => Synced::Local(f(value)),
        }
    }
}

/// Result of the start-of-session health probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Online,
    Offline,
}

/// A state-changing operation
#[async_trait]
pub trait Mutation: Send + Sync {
    type Response: Send;
    type Output: Send;

    /// Short name for logs
    fn label(&self) -> &'static str;

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Self::Response>;

    /// Fold the service's answer into the state
    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Self::Response,
    ) -> Result<Self::Output, SyncError>;

    /// Perform the operation on local data alone, enforcing the same rules
    /// the service would
    fn apply_local(
        &self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<Self::Output, SyncError>;
}

/// A read operation
#[async_trait]
pub trait Query: Send + Sync {
    type Response: Send;
    type Output: Send;

    fn label(&self) -> &'static str;

    /// Collection to restore from the snapshot when falling back
    fn collection(&self) -> Collection;

    async fn fetch(&self, remote: &dyn RemoteContentService) -> RemoteResult<Self::Response>;

    /// Merge fetched data into the state
    fn merge(&self, state: &mut SessionState, response: Self::Response);

    /// Answer the query from the state
    fn read(&self, state: &SessionState) -> Result<Self::Output, SyncError>;
}

/// Remote-first coordinator over the session state
pub struct SyncCoordinator {
    remote: Arc<dyn RemoteContentService>,
    store: Arc<LocalStore>,
    state: RwLock<SessionState>,
    mode: OnceCell<SessionMode>,
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("store", &self.store)
            .field("mode", &self.mode.get())
            .finish()
    }
}

impl SyncCoordinator {
    pub fn new(remote: Arc<dyn RemoteContentService>, store: Arc<LocalStore>) -> Self {
        Self {
            remote,
            store,
            state: RwLock::new(SessionState::default()),
            mode: OnceCell::new(),
        }
    }

    /// Run the one-time health probe.
    ///
    /// If the service is down, every empty collection is filled from the
    /// local snapshot. Later calls return the first result.
    pub async fn start(&self) -> SessionMode {
        *self
            .mode
            .get_or_init(|| async {
                match self.remote.health().await {
                    Ok(()) => {
                        tracing::info!("Remote content service reachable");
                        SessionMode::Online
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Remote content service unreachable, using local snapshot"
                        );
                        for collection in Collection::ALL {
                            self.restore(collection).await;
                        }
                        SessionMode::Offline
                    }
                }
            })
            .await
    }

    /// Outcome of the start-of-session probe, if it has run
    pub fn session_mode(&self) -> Option<SessionMode> {
        self.mode.get().copied()
    }

    /// Check connectivity now
    pub async fn probe_remote(&self) -> Result<(), SyncError> {
        self.remote.health().await.map_err(SyncError::from)
    }

    pub async fn write<M: Mutation>(&self, op: M) -> Result<Synced<M::Output>, SyncError> {
        self.start().await;

        match op.send(self.remote.as_ref()).await {
            Ok(response) => {
                let (output, snapshot) = {
                    let mut state = self.state.write().await;
                    let output = op.apply_remote(&mut state, response)?;
                    (output, state.snapshot())
                };
                tracing::debug!(op = op.label(), "Applied remotely");
                self.persist(snapshot).await;
                Ok(Synced::Remote(output))
            }
            Err(RemoteError::Unavailable(reason)) => {
                tracing::warn!(op = op.label(), %reason, "Remote unavailable, applying locally");
                let (output, snapshot) = {
                    let mut state = self.state.write().await;
                    let output = op.apply_local(&mut state, Utc::now())?;
                    (output, state.snapshot())
                };
                self.persist(snapshot).await;
                Ok(Synced::Local(output))
            }
            Err(rejected) => {
                tracing::debug!(op = op.label(), error = %rejected, "Rejected by remote");
                Err(rejected.into())
            }
        }
    }

    pub async fn read<Q: Query>(&self, query: Q) -> Result<Synced<Q::Output>, SyncError> {
        self.start().await;

        match query.fetch(self.remote.as_ref()).await {
            Ok(response) => {
                let (output, snapshot) = {
                    let mut state = self.state.write().await;
                    query.merge(&mut state, response);
                    (query.read(&state), state.snapshot())
                };
                self.persist(snapshot).await;
                output.map(Synced::Remote)
            }
            Err(RemoteError::Unavailable(reason)) => {
                tracing::warn!(
                    query = query.label(),
                    %reason,
                    "Remote unavailable, reading local data"
                );
                self.restore(query.collection()).await;
                let state = self.state.read().await;
                query.read(&state).map(Synced::Local)
            }
            Err(rejected) => Err(rejected.into()),
        }
    }

    /// Read-only access to the current state
    pub async fn view<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Change session-only fields; nothing is persisted
    pub(crate) async fn update_session<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.write().await;
        f(&mut state)
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.current_user.clone()
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.state.read().await.articles.clone()
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.notifications.clone()
    }

    /// Write the current state to the local store, reporting failures
    pub async fn flush(&self) -> Result<(), SyncError> {
        let snapshot = self.state.read().await.snapshot();
        self.write_snapshot(&snapshot)
            .await
            .map_err(|e| SyncError::Persistence(format!("{:#}", e)))
    }

    async fn persist(&self, snapshot: Snapshot) {
        if let Err(e) = self.write_snapshot(&snapshot).await {
            tracing::warn!("Failed to persist local snapshot: {:#}", e);
        }
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        futures::try_join!(
            self.store.set(Collection::Users.key(), &snapshot.users),
            self.store.set(Collection::Articles.key(), &snapshot.articles),
            self.store.set(Collection::Notifications.key(), &snapshot.notifications),
        )?;
        Ok(())
    }

    /// Fill a collection from the snapshot if it is empty in memory.
    ///
    /// An unreadable snapshot is logged and leaves the collection empty.
    async fn restore(&self, collection: Collection) {
        if let Err(e) = self.try_restore(collection).await {
            tracing::warn!(collection = collection.key(), "Failed to load local snapshot: {:#}", e);
        }
    }

    async fn try_restore(&self, collection: Collection) -> anyhow::Result<()> {
        if !self.state.read().await.is_empty(collection) {
            return Ok(());
        }
        let key = collection.key();
        match collection {
            Collection::Users => {
                let users: Option<Vec<User>> = self.store.get(key).await?;
                let mut state = self.state.write().await;
                if let (Some(users), true) = (users, state.users.is_empty()) {
                    state.users = users;
                }
            }
            Collection::Articles => {
                let articles: Option<Vec<Article>> = self.store.get(key).await?;
                let mut state = self.state.write().await;
                if let (Some(mut articles), true) = (articles, state.articles.is_empty()) {
                    crate::workflow::sort_newest_first(&mut articles);
                    state.articles = articles;
                }
            }
            Collection::Notifications => {
                let notifications: Option<Vec<Notification>> = self.store.get(key).await?;
                let mut state = self.state.write().await;
                let notifications_empty = state.notifications.is_empty();
                if let (Some(notifications), true) = (notifications, notifications_empty) {
                    for notification in notifications {
                        state.upsert_notification(notification);
                    }
                }
            }
        }
        tracing::debug!(collection = key, "Restored collection from local snapshot");
        Ok(())
    }
}
