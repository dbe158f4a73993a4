//! User service
//!
//! Login, account administration and the session's current user.
//!
//! Credentials are plaintext end to end: the remote service compares them
//! verbatim and so does the offline fallback against the cached users. This
//! is a known weakness kept so existing accounts keep working.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{NewUser, User, UserRole};
use crate::remote::{Credentials, RemoteContentService, RemoteResult};
use crate::sync::{Collection, Mutation, Query, SessionState, SyncCoordinator, SyncError, Synced};
use crate::workflow::Actor;

/// Password given to an account by an admin reset
pub const RESET_PASSWORD: &str = "123";

/// User service
pub struct UserService {
    sync: Arc<SyncCoordinator>,
}

impl UserService {
    pub fn new(sync: Arc<SyncCoordinator>) -> Self {
        Self { sync }
    }

    /// Log in and make the user current for this session.
    ///
    /// Offline, the cached account must match username, password and role
    /// and be active.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Synced<User>, SyncError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(SyncError::Validation(vec![
                "Username and password are required".to_string(),
            ]));
        }
        let user = self
            .sync
            .write(Login(Credentials {
                username: username.trim().to_string(),
                password: password.to_string(),
                role,
            }))
            .await?;
        tracing::info!(
            user_id = user.value().id,
            role = %role,
            local = user.is_local(),
            "User logged in"
        );
        Ok(user)
    }

    pub async fn logout(&self) {
        self.sync.update_session(|state| state.current_user = None).await;
    }

    pub async fn current_user(&self) -> Option<User> {
        self.sync.current_user().await
    }

    /// All accounts, without credentials
    pub async fn list(&self) -> Result<Synced<Vec<User>>, SyncError> {
        self.sync.read(ListUsers).await
    }

    /// Create an account. Admin only.
    ///
    /// The admin check happens here; the remote service does not enforce it.
    pub async fn create(&self, actor: &Actor, user: NewUser) -> Result<Synced<User>, SyncError> {
        require_admin(actor, "only admins can create users")?;
        let mut errors = user.violations();
        let taken = self
            .sync
            .view(|state| state.users.iter().any(|u| u.username == user.username))
            .await;
        if taken {
            errors.push("Username already exists".to_string());
        }
        if !errors.is_empty() {
            return Err(SyncError::Validation(errors));
        }

        let created = self.sync.write(CreateUser { actor: *actor, user }).await?;
        tracing::info!(user_id = created.value().id, local = created.is_local(), "User created");
        Ok(created)
    }

    /// Activate or deactivate an account. Admin only.
    pub async fn set_active(
        &self,
        actor: &Actor,
        id: i64,
        active: bool,
    ) -> Result<Synced<User>, SyncError> {
        require_admin(actor, "only admins can change account status")?;
        let user = self.sync.write(SetActive { id, active }).await?;
        tracing::info!(user_id = id, active, local = user.is_local(), "User status changed");
        Ok(user)
    }

    /// Flip an account's active flag. Admin only.
    pub async fn toggle_active(&self, actor: &Actor, id: i64) -> Result<Synced<User>, SyncError> {
        let active = self
            .sync
            .view(|state| state.user(id).map(|u| u.active))
            .await
            .ok_or_else(|| SyncError::NotFound(format!("User {}", id)))?;
        self.set_active(actor, id, !active).await
    }

    /// Reset an account's password to [`RESET_PASSWORD`]. Admin only.
    pub async fn reset_password(&self, actor: &Actor, id: i64) -> Result<Synced<User>, SyncError> {
        require_admin(actor, "only admins can reset passwords")?;
        let user = self.sync.write(ResetPassword { id }).await?;
        tracing::info!(user_id = id, local = user.is_local(), "Password reset");
        Ok(user)
    }
}

fn require_admin(actor: &Actor, message: &str) -> Result<(), SyncError> {
    if actor.role == UserRole::Admin {
        Ok(())
    } else {
        Err(SyncError::ForbiddenTransition(message.to_string()))
    }
}

fn user_not_found(id: i64) -> SyncError {
    SyncError::NotFound(format!("User {}", id))
}

struct Login(Credentials);

#[async_trait]
impl Mutation for Login {
    type Response = User;
    type Output = User;

    fn label(&self) -> &'static str {
        "login"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<User> {
        remote.login(&self.0).await
    }

    fn apply_remote(&self, state: &mut SessionState, response: User) -> Result<User, SyncError> {
        // Keep the accepted credential so this account can log in offline later
        let mut cached = response;
        cached.password = Some(self.0.password.clone());
        let user = state.upsert_user(cached).without_password();
        state.current_user = Some(user.clone());
        Ok(user)
    }

    fn apply_local(&self, state: &mut SessionState, now: DateTime<Utc>) -> Result<User, SyncError> {
        let credentials = &self.0;
        let user = state
            .users
            .iter_mut()
            .find(|u| {
                u.username == credentials.username
                    && u.password.as_deref() == Some(credentials.password.as_str())
                    && u.role == credentials.role
                    && u.active
            })
            .ok_or_else(|| SyncError::Authentication("Invalid credentials".to_string()))?;
        user.last_login = Some(now);
        let user = user.without_password();
        state.current_user = Some(user.clone());
        Ok(user)
    }
}

struct ListUsers;

#[async_trait]
impl Query for ListUsers {
    type Response = Vec<User>;
    type Output = Vec<User>;

    fn label(&self) -> &'static str {
        "list_users"
    }

    fn collection(&self) -> Collection {
        Collection::Users
    }

    async fn fetch(&self, remote: &dyn RemoteContentService) -> RemoteResult<Vec<User>> {
        remote.list_users().await
    }

    fn merge(&self, state: &mut SessionState, response: Vec<User>) {
        state.merge_users(response);
    }

    fn read(&self, state: &SessionState) -> Result<Vec<User>, SyncError> {
        Ok(state.users.iter().map(User::without_password).collect())
    }
}

struct CreateUser {
    actor: Actor,
    user: NewUser,
}

#[async_trait]
impl Mutation for CreateUser {
    type Response = User;
    type Output = User;

    fn label(&self) -> &'static str {
        "create_user"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<User> {
        remote.create_user(&self.actor, &self.user).await
    }

    fn apply_remote(&self, state: &mut SessionState, response: User) -> Result<User, SyncError> {
        let mut cached = response;
        cached.password = Some(self.user.password.clone());
        Ok(state.upsert_user(cached).without_password())
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        _now: DateTime<Utc>,
    ) -> Result<User, SyncError> {
        if state.users.iter().any(|u| u.username == self.user.username) {
            return Err(SyncError::Validation(vec!["Username already exists".to_string()]));
        }
        let user = User {
            id: state.next_user_id(),
            username: self.user.username.clone(),
            password: Some(self.user.password.clone()),
            name: self.user.name.clone(),
            role: self.user.role,
            talent: self.user.effective_talent(),
            active: true,
            last_login: None,
        };
        Ok(state.upsert_user(user).without_password())
    }
}

struct SetActive {
    id: i64,
    active: bool,
}

#[async_trait]
impl Mutation for SetActive {
    type Response = User;
    type Output = User;

    fn label(&self) -> &'static str {
        "set_user_active"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<User> {
        remote.set_user_active(self.id, self.active).await
    }

    fn apply_remote(&self, state: &mut SessionState, response: User) -> Result<User, SyncError> {
        Ok(state.upsert_user(response).without_password())
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        _now: DateTime<Utc>,
    ) -> Result<User, SyncError> {
        let user = state.user_mut(self.id).ok_or_else(|| user_not_found(self.id))?;
        user.active = self.active;
        Ok(user.without_password())
    }
}

struct ResetPassword {
    id: i64,
}

#[async_trait]
impl Mutation for ResetPassword {
    type Response = User;
    type Output = User;

    fn label(&self) -> &'static str {
        "reset_password"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<User> {
        remote.reset_password(self.id, RESET_PASSWORD).await
    }

    fn apply_remote(&self, state: &mut SessionState, response: User) -> Result<User, SyncError> {
        let mut cached = response;
        cached.password = Some(RESET_PASSWORD.to_string());
        Ok(state.upsert_user(cached).without_password())
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        _now: DateTime<Utc>,
    ) -> Result<User, SyncError> {
        let user = state.user_mut(self.id).ok_or_else(|| user_not_found(self.id))?;
        user.password = Some(RESET_PASSWORD.to_string());
        Ok(user.without_password())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LocalStore, MemoryStore};
    use crate::models::TalentCategory;
    use crate::remote::fake::FakeRemote;

    const ADMIN: Actor = Actor { id: 1, role: UserRole::Admin };
    const TEACHER: Actor = Actor { id: 2, role: UserRole::Teacher };

    async fn service() -> (Arc<FakeRemote>, UserService) {
        let remote = Arc::new(FakeRemote::with_seed_users().await);
        let store = Arc::new(LocalStore::Memory(MemoryStore::new()));
        let sync = Arc::new(SyncCoordinator::new(remote.clone(), store));
        (remote, UserService::new(sync))
    }

    fn new_user(username: &str, role: UserRole) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: "pass".to_string(),
            name: "New Person".to_string(),
            role,
            talent: Some(TalentCategory::Mathematical),
        }
    }

    #[tokio::test]
    async fn test_login_sets_current_user() {
        let (_remote, users) = service().await;
        let user = users.login("docente1", "123", UserRole::Teacher).await.unwrap();
        assert!(!user.is_local());
        let user = user.into_inner();
        assert!(user.password.is_none());
        assert!(user.last_login.is_some());
        assert_eq!(users.current_user().await.unwrap().id, user.id);

        users.logout().await;
        assert!(users.current_user().await.is_none());
    }

    #[tokio::test]
    async fn test_wrong_role_or_password_fails() {
        let (_remote, users) = service().await;
        assert!(matches!(
            users.login("docente1", "123", UserRole::Admin).await,
            Err(SyncError::Authentication(_))
        ));
        assert!(matches!(
            users.login("docente1", "nope", UserRole::Teacher).await,
            Err(SyncError::Authentication(_))
        ));
        assert!(matches!(
            users.login("", "", UserRole::Teacher).await,
            Err(SyncError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_offline_login_uses_cached_credentials() {
        let (remote, users) = service().await;
        users.login("estudiante1", "123", UserRole::Student).await.unwrap();
        users.logout().await;

        remote.set_online(false);
        let offline = users.login("estudiante1", "123", UserRole::Student).await.unwrap();
        assert!(offline.is_local());
        assert_eq!(offline.value().username, "estudiante1");

        let err = users.login("estudiante1", "bad", UserRole::Student).await.unwrap_err();
        assert!(matches!(err, SyncError::Authentication(_)));
        // Never logged in on this device, so unknown offline
        let err = users.login("padre1", "123", UserRole::Parent).await.unwrap_err();
        assert!(matches!(err, SyncError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_create_user_rules() {
        let (_remote, users) = service().await;
        let err = users.create(&TEACHER, new_user("newbie", UserRole::Student)).await.unwrap_err();
        assert!(matches!(err, SyncError::ForbiddenTransition(_)));

        users.list().await.unwrap();
        let err = users.create(&ADMIN, new_user("admin", UserRole::Student)).await.unwrap_err();
        match err {
            SyncError::Validation(errors) => assert_eq!(errors, vec!["Username already exists"]),
            other => panic!("unexpected {:?}", other),
        }

        let mut short = new_user("ab", UserRole::Student);
        short.password = "x".to_string();
        match users.create(&ADMIN, short).await {
            Err(SyncError::Validation(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }

        let teacher = users
            .create(&ADMIN, new_user("teacher2", UserRole::Teacher))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(teacher.talent, None);
        assert!(teacher.password.is_none());
    }

    #[tokio::test]
    async fn test_offline_created_user_can_log_in() {
        let (remote, users) = service().await;
        users.list().await.unwrap();
        remote.set_online(false);

        let created = users.create(&ADMIN, new_user("offline1", UserRole::Student)).await.unwrap();
        assert!(created.is_local());
        assert_eq!(created.value().id, 6);

        let logged = users.login("offline1", "pass", UserRole::Student).await.unwrap();
        assert_eq!(logged.value().id, 6);
    }

    #[tokio::test]
    async fn test_toggle_and_reset() {
        let (remote, users) = service().await;
        users.list().await.unwrap();

        let toggled = users.toggle_active(&ADMIN, 4).await.unwrap().into_inner();
        assert!(!toggled.active);
        assert!(matches!(
            users.login("estudiante2", "123", UserRole::Student).await,
            Err(SyncError::Authentication(_))
        ));
        let toggled = users.toggle_active(&ADMIN, 4).await.unwrap().into_inner();
        assert!(toggled.active);

        assert!(matches!(
            users.reset_password(&TEACHER, 4).await,
            Err(SyncError::ForbiddenTransition(_))
        ));
        remote.set_online(false);
        let reset = users.reset_password(&ADMIN, 4).await.unwrap();
        assert!(reset.is_local());
        let logged = users.login("estudiante2", RESET_PASSWORD, UserRole::Student).await.unwrap();
        assert!(logged.is_local());
    }
}
