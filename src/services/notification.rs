//! Notification dispatcher

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{NewNotification, Notification};
use crate::remote::{RemoteContentService, RemoteResult};
use crate::sync::{Collection, Mutation, Query, SessionState, SyncCoordinator, SyncError, Synced};

/// Creates, lists and marks notifications through the sync coordinator
pub struct NotificationService {
    sync: Arc<SyncCoordinator>,
}

impl NotificationService {
    pub fn new(sync: Arc<SyncCoordinator>) -> Self {
        Self { sync }
    }

    /// Create a notification for `notification.user_id`
    pub async fn notify(
        &self,
        notification: NewNotification,
    ) -> Result<Synced<Notification>, SyncError> {
        self.sync.write(CreateNotification(notification)).await
    }

    /// Best-effort delivery used as a side effect of other operations.
    ///
    /// Failures are logged and never reach the caller.
    pub async fn dispatch(&self, notification: NewNotification) {
        let user_id = notification.user_id;
        match self.notify(notification).await {
            Ok(sent) => tracing::debug!(
                user_id,
                notification_id = sent.value().id,
                local = sent.is_local(),
                "Notification dispatched"
            ),
            Err(e) => tracing::warn!(user_id, "Failed to dispatch notification: {}", e),
        }
    }

    /// A user's notifications, most recent first
    pub async fn list(&self, user_id: i64) -> Result<Synced<Vec<Notification>>, SyncError> {
        self.sync.read(ListNotifications { user_id }).await
    }

    /// Mark a notification as read.
    ///
    /// Marking it again changes nothing. The returned notification's `link`
    /// names the view the caller should open, if any.
    pub async fn mark_read(&self, id: i64) -> Result<Synced<Notification>, SyncError> {
        self.sync.write(MarkRead(id)).await
    }

    pub async fn delete(&self, id: i64) -> Result<Synced<()>, SyncError> {
        self.sync.write(DeleteNotification(id)).await
    }

    /// Unread count from the current state, without a remote call
    pub async fn unread_count(&self, user_id: i64) -> usize {
        self.sync
            .view(|state| {
                state
                    .notifications
                    .iter()
                    .filter(|n| n.user_id == user_id && !n.read)
                    .count()
            })
            .await
    }
}

struct CreateNotification(NewNotification);

#[async_trait]
impl Mutation for CreateNotification {
    type Response = Notification;
    type Output = Notification;

    fn label(&self) -> &'static str {
        "create_notification"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Notification> {
        remote.create_notification(&self.0).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Notification,
    ) -> Result<Notification, SyncError> {
        state.upsert_notification(response.clone());
        Ok(response)
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<Notification, SyncError> {
        if !state.knows_user(self.0.user_id) {
            return Err(SyncError::NotFound(format!("User {}", self.0.user_id)));
        }
        let notification = Notification {
            id: state.next_notification_id(),
            user_id: self.0.user_id,
            title: self.0.title.clone(),
            content: self.0.content.clone(),
            kind: self.0.kind,
            read: false,
            link: self.0.link.clone(),
            created_at: now,
        };
        state.upsert_notification(notification.clone());
        Ok(notification)
    }
}

struct ListNotifications {
    user_id: i64,
}

#[async_trait]
impl Query for ListNotifications {
    type Response = Vec<Notification>;
    type Output = Vec<Notification>;

    fn label(&self) -> &'static str {
        "list_notifications"
    }

    fn collection(&self) -> Collection {
        Collection::Notifications
    }

    async fn fetch(&self, remote: &dyn RemoteContentService) -> RemoteResult<Vec<Notification>> {
        remote.list_notifications(self.user_id).await
    }

    fn merge(&self, state: &mut SessionState, response: Vec<Notification>) {
        state.merge_notifications(self.user_id, response);
    }

    fn read(&self, state: &SessionState) -> Result<Vec<Notification>, SyncError> {
        Ok(state.notifications_for(self.user_id))
    }
}

struct MarkRead(i64);

#[async_trait]
impl Mutation for MarkRead {
    type Response = Notification;
    type Output = Notification;

    fn label(&self) -> &'static str {
        "mark_notification_read"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Notification> {
        remote.mark_notification_read(self.0).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Notification,
    ) -> Result<Notification, SyncError> {
        state.upsert_notification(response.clone());
        Ok(response)
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        _now: DateTime<Utc>,
    ) -> Result<Notification, SyncError> {
        let notification = state
            .notification_mut(self.0)
            .ok_or_else(|| SyncError::NotFound(format!("Notification {}", self.0)))?;
        notification.read = true;
        Ok(notification.clone())
    }
}

struct DeleteNotification(i64);

#[async_trait]
impl Mutation for DeleteNotification {
    type Response = ();
    type Output = ();

    fn label(&self) -> &'static str {
        "delete_notification"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<()> {
        remote.delete_notification(self.0).await
    }

    fn apply_remote(&self, state: &mut SessionState, _response: ()) -> Result<(), SyncError> {
        state.notifications.retain(|n| n.id != self.0);
        Ok(())
    }

    fn apply_local(&self, state: &mut SessionState, _now: DateTime<Utc>) -> Result<(), SyncError> {
        let before = state.notifications.len();
        state.notifications.retain(|n| n.id != self.0);
        if state.notifications.len() == before {
            return Err(SyncError::NotFound(format!("Notification {}", self.0)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LocalStore, MemoryStore};
    use crate::models::NotificationType;
    use crate::remote::fake::FakeRemote;
    use crate::services::UserService;

    fn service(remote: Arc<FakeRemote>) -> NotificationService {
        let store = Arc::new(LocalStore::Memory(MemoryStore::new()));
        NotificationService::new(Arc::new(SyncCoordinator::new(remote, store)))
    }

    #[tokio::test]
    async fn test_notify_and_list_most_recent_first() {
        let remote = Arc::new(FakeRemote::new());
        let notifications = service(remote.clone());

        notifications
            .notify(NewNotification::new(3, "First", "one", NotificationType::Info))
            .await
            .unwrap();
        notifications
            .notify(NewNotification::new(3, "Second", "two", NotificationType::Success))
            .await
            .unwrap();
        notifications
            .notify(NewNotification::new(4, "Other", "x", NotificationType::Info))
            .await
            .unwrap();

        let listed = notifications.list(3).await.unwrap();
        assert!(!listed.is_local());
        let titles: Vec<String> = listed.into_inner().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Second".to_string(), "First".to_string()]);
        assert_eq!(notifications.unread_count(3).await, 2);
    }

    #[tokio::test]
    async fn test_offline_notify_prepends_with_next_id() {
        let remote = Arc::new(FakeRemote::new());
        let notifications = service(remote.clone());
        notifications
            .notify(NewNotification::new(3, "Online", "a", NotificationType::Info))
            .await
            .unwrap();

        remote.set_online(false);
        let local = notifications
            .notify(NewNotification::new(3, "Offline", "b", NotificationType::Warning))
            .await
            .unwrap();
        assert!(local.is_local());
        assert_eq!(local.value().id, 2);

        let listed = notifications.list(3).await.unwrap().into_inner();
        assert_eq!(listed[0].title, "Offline");
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let remote = Arc::new(FakeRemote::new());
        let notifications = service(remote.clone());
        let created = notifications
            .notify(
                NewNotification::new(3, "Hi", "x", NotificationType::Info)
                    .with_link("articles"),
            )
            .await
            .unwrap()
            .into_inner();

        let first = notifications.mark_read(created.id).await.unwrap().into_inner();
        let after_first = notifications.list(3).await.unwrap().into_inner();
        let second = notifications.mark_read(created.id).await.unwrap().into_inner();
        let after_second = notifications.list(3).await.unwrap().into_inner();

        assert!(first.read && second.read);
        assert_eq!(first.link.as_deref(), Some("articles"));
        assert_eq!(after_first, after_second);

        // Same guarantee offline
        remote.set_online(false);
        let offline = notifications.mark_read(created.id).await.unwrap();
        assert!(offline.is_local());
        assert_eq!(notifications.list(3).await.unwrap().into_inner(), after_second);
    }

    #[tokio::test]
    async fn test_offline_notify_unknown_user_is_not_found() {
        let remote = Arc::new(FakeRemote::with_seed_users().await);
        let sync = Arc::new(SyncCoordinator::new(
            remote.clone(),
            Arc::new(LocalStore::Memory(MemoryStore::new())),
        ));
        UserService::new(sync.clone()).list().await.unwrap();
        let notifications = NotificationService::new(sync);

        remote.set_online(false);
        let err = notifications
            .notify(NewNotification::new(99, "Lost", "x", NotificationType::Info))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
        assert!(notifications.list(99).await.unwrap().into_inner().is_empty());

        let known = notifications
            .notify(NewNotification::new(3, "Kept", "x", NotificationType::Info))
            .await
            .unwrap();
        assert!(known.is_local());
    }

    #[tokio::test]
    async fn test_mark_read_unknown_offline_is_not_found() {
        let remote = Arc::new(FakeRemote::new());
        remote.set_online(false);
        let notifications = service(remote);
        let err = notifications.mark_read(42).await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_notification() {
        let remote = Arc::new(FakeRemote::new());
        let notifications = service(remote.clone());
        let created = notifications
            .notify(NewNotification::new(3, "Hi", "x", NotificationType::Info))
            .await
            .unwrap()
            .into_inner();

        notifications.delete(created.id).await.unwrap();
        assert!(notifications.list(3).await.unwrap().into_inner().is_empty());
        assert!(remote.notifications_for(3).await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_delivers_without_result() {
        let remote = Arc::new(FakeRemote::new());
        let notifications = service(remote);
        notifications
            .dispatch(NewNotification::new(3, "Hi", "x", NotificationType::Info))
            .await;
        assert_eq!(notifications.unread_count(3).await, 1);
    }
}
