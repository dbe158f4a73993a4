//! Services layer - Client core
//!
//! Operations the presentation layer calls. Every service goes through the
//! shared [`SyncCoordinator`], so each result says whether it was confirmed
//! remotely or only applied on this device.
//!
//! - `ArticleService`: the review workflow
//! - `NotificationService`: notification dispatch
//! - `CommentService`, `UserService`: comments, login and account admin
//! - `GameStatsService`, `ReportService`: peripheral dashboard features

pub mod article;
pub mod comment;
pub mod games;
pub mod notification;
pub mod report;
pub mod user;

pub use article::ArticleService;
pub use comment::CommentService;
pub use games::GameStatsService;
pub use notification::NotificationService;
pub use report::{Export, MagazineStats, ReportService};
pub use user::{UserService, RESET_PASSWORD};

use std::sync::Arc;

use crate::cache::{create_store, LocalStore};
use crate::config::Config;
use crate::remote::{HttpRemote, RemoteContentService};
use crate::sync::SyncCoordinator;

/// Every client service wired to one coordinator
pub struct Portal {
    pub sync: Arc<SyncCoordinator>,
    pub articles: ArticleService,
    pub comments: CommentService,
    pub notifications: Arc<NotificationService>,
    pub users: UserService,
    pub games: GameStatsService,
    pub reports: ReportService,
}

impl Portal {
    pub fn new(remote: Arc<dyn RemoteContentService>, store: Arc<LocalStore>) -> Self {
        let sync = Arc::new(SyncCoordinator::new(remote, store.clone()));
        let notifications = Arc::new(NotificationService::new(sync.clone()));
        Self {
            articles: ArticleService::new(sync.clone(), notifications.clone()),
            comments: CommentService::new(sync.clone(), notifications.clone()),
            users: UserService::new(sync.clone()),
            games: GameStatsService::new(store),
            reports: ReportService::new(sync.clone()),
            notifications,
            sync,
        }
    }

    /// HTTP remote and local store as configured
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let remote = HttpRemote::new(&config.remote)?;
        let store = create_store(&config.store)?;
        Ok(Self::new(Arc::new(remote), store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileStore, KeyValueStore};
    use crate::models::{ArticleFilter, Chapter, NewArticle, TalentCategory, UserRole};
    use crate::remote::fake::FakeRemote;
    use crate::sync::SessionMode;
    use crate::workflow::Actor;
    use tempfile::TempDir;

    fn file_store(dir: &TempDir) -> Arc<LocalStore> {
        Arc::new(LocalStore::File(FileStore::open(dir.path()).unwrap()))
    }

    #[tokio::test]
    async fn test_offline_from_the_start() {
        let remote = Arc::new(FakeRemote::with_seed_users().await);
        remote.set_online(false);
        let portal = Portal::new(remote, Arc::new(LocalStore::Memory(Default::default())));

        let student = Actor::new(3, UserRole::Student);
        let article = NewArticle::new(
            "Written on the bus",
            TalentCategory::Linguistic,
            Chapter::Experiences,
            "No network, still writing the article.",
        );
        let created = portal.articles.create(&student, article).await.unwrap();
        assert!(created.is_local());
        assert_eq!(created.value().id, 1);
        assert_eq!(portal.sync.session_mode(), Some(SessionMode::Offline));

        let listed = portal.articles.list(&student, ArticleFilter::default()).await.unwrap();
        assert_eq!(listed.into_inner(), vec![created.into_inner()]);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_across_restart() {
        let dir = TempDir::new().unwrap();
        let before = {
            let remote = Arc::new(FakeRemote::with_seed_users().await);
            let portal = Portal::new(remote, file_store(&dir));
            let admin = Actor::new(1, UserRole::Admin);
            let student = Actor::new(3, UserRole::Student);

            portal.users.login("admin", "admin", UserRole::Admin).await.unwrap();
            portal.users.list().await.unwrap();
            let article = NewArticle::new(
                "Kept across restarts",
                TalentCategory::Artistic,
                Chapter::Positioning,
                "Content that should be in the snapshot.",
            )
            .submitted();
            let id = portal.articles.create(&student, article).await.unwrap().into_inner().id;
            portal.articles.approve(&admin, id).await.unwrap();
            portal.comments.add(&admin, id, "Well done").await.unwrap();
            portal.notifications.list(student.id).await.unwrap();
            portal.sync.flush().await.unwrap();
            portal.sync.view(|state| state.snapshot()).await
        };

        let remote = Arc::new(FakeRemote::new());
        remote.set_online(false);
        let portal = Portal::new(remote, file_store(&dir));
        assert_eq!(portal.sync.start().await, SessionMode::Offline);
        let after = portal.sync.view(|state| state.snapshot()).await;

        assert_eq!(after, before);
        assert_eq!(after.articles[0].comments.len(), 1);
        assert_eq!(after.notifications.len(), 2);

        let raw: Option<Vec<serde_json::Value>> = file_store(&dir).get("users").await.unwrap();
        assert_eq!(raw.unwrap().len(), 5);
    }
}
