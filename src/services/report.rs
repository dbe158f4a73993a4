//! Admin statistics and data export

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::{Article, Notification, User};
use crate::sync::{SessionState, SyncCoordinator};

/// Mask shown instead of a credential in exports
const MASKED: &str = "***";

/// Counts over everything currently loaded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MagazineStats {
    pub total_articles: usize,
    pub articles_by_status: BTreeMap<String, usize>,
    pub articles_by_category: BTreeMap<String, usize>,
    pub articles_by_chapter: BTreeMap<String, usize>,
    pub total_users: usize,
    pub active_users: usize,
    pub users_by_role: BTreeMap<String, usize>,
    pub total_comments: usize,
}

impl MagazineStats {
    pub fn from_state(state: &SessionState) -> Self {
        let mut stats = MagazineStats {
            total_articles: state.articles.len(),
            total_users: state.users.len(),
            ..Default::default()
        };
        for article in &state.articles {
            *stats.articles_by_status.entry(article.status.to_string()).or_default() += 1;
            *stats.articles_by_category.entry(article.category.to_string()).or_default() += 1;
            *stats.articles_by_chapter.entry(article.chapter.to_string()).or_default() += 1;
            stats.total_comments += article.comments.len();
        }
        for user in &state.users {
            *stats.users_by_role.entry(user.role.to_string()).or_default() += 1;
            if user.active {
                stats.active_users += 1;
            }
        }
        stats
    }
}

/// Full data dump for admins
#[derive(Debug, Clone, Serialize)]
pub struct Export {
    pub exported_at: DateTime<Utc>,
    pub users: Vec<User>,
    pub articles: Vec<Article>,
    pub notifications: Vec<Notification>,
}

pub struct ReportService {
    sync: Arc<SyncCoordinator>,
}

impl ReportService {
    pub fn new(sync: Arc<SyncCoordinator>) -> Self {
        Self { sync }
    }

    pub async fn stats(&self) -> MagazineStats {
        self.sync.view(MagazineStats::from_state).await
    }

    /// Everything loaded, with passwords masked
    pub async fn export(&self) -> Export {
        self.sync
            .view(|state| Export {
                exported_at: Utc::now(),
                users: state
                    .users
                    .iter()
                    .map(|u| User {
                        password: u.password.as_ref().map(|_| MASKED.to_string()),
                        ..u.clone()
                    })
                    .collect(),
                articles: state.articles.clone(),
                notifications: state.notifications.clone(),
            })
            .await
    }
}
