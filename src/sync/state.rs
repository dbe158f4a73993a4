//! In-memory session state and the rules for merging remote data into it

use serde::{Deserialize, Serialize};

use crate::models::{Article, ArticleFilter, Notification, User};
use crate::workflow::{next_id, sort_newest_first};

/// Mirrored collections, each persisted under its own store key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Articles,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Users,
        Collection::Articles,
        Collection::Notifications,
    ];

    /// Store key of the collection's snapshot
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Articles => "articles",
            Collection::Notifications => "notifications",
        }
    }
}

/// Everything the client currently knows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub users: Vec<User>,
    /// Newest first, comments embedded
    pub articles: Vec<Article>,
    /// Newest first, all users mixed
    pub notifications: Vec<Notification>,
    /// Logged-in user. Never persisted.
    pub current_user: Option<User>,
}

/// Owned copy of the persisted collections
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub articles: Vec<Article>,
    pub notifications: Vec<Notification>,
}

impl SessionState {
    pub fn is_empty(&self, collection: Collection) -> bool {
        match collection {
            Collection::Users => self.users.is_empty(),
            Collection::Articles => self.articles.is_empty(),
            Collection::Notifications => self.notifications.is_empty(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            users: self.users.clone(),
            articles: self.articles.clone(),
            notifications: self.notifications.clone(),
        }
    }

    pub fn article(&self, id: i64) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    pub fn article_mut(&mut self, id: i64) -> Option<&mut Article> {
        self.articles.iter_mut().find(|a| a.id == id)
    }

    pub fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn user_mut(&mut self, id: i64) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    pub fn notification_mut(&mut self, id: i64) -> Option<&mut Notification> {
        self.notifications.iter_mut().find(|n| n.id == id)
    }

    /// Whether `user_id` can be referenced offline. With no users loaded
    /// nothing is known either way; otherwise the id must belong to a
    /// cached user or to the author of a loaded article or comment.
    pub fn knows_user(&self, user_id: i64) -> bool {
        self.users.is_empty()
            || self.user(user_id).is_some()
            || self.articles.iter().any(|a| {
                a.author_id == user_id || a.comments.iter().any(|c| c.author_id == user_id)
            })
    }

    /// Display name of a known user
    pub fn display_name(&self, user_id: i64) -> Option<String> {
        self.user(user_id).map(|u| u.name.clone())
    }

    pub fn next_article_id(&self) -> i64 {
        next_id(self.articles.iter().map(|a| a.id))
    }

    pub fn next_user_id(&self) -> i64 {
        next_id(self.users.iter().map(|u| u.id))
    }

    pub fn next_notification_id(&self) -> i64 {
        next_id(self.notifications.iter().map(|n| n.id))
    }

    /// Comment ids are unique across all articles
    pub fn next_comment_id(&self) -> i64 {
        next_id(
            self.articles
                .iter()
                .flat_map(|a| a.comments.iter().map(|c| c.id)),
        )
    }

    /// Insert or replace an article, returning the stored copy.
    ///
    /// An incoming article without comments keeps the comments already
    /// loaded for it; listings do not always embed them.
    pub fn upsert_article(&mut self, mut incoming: Article) -> Article {
        match self.article_mut(incoming.id) {
            Some(existing) => {
                if incoming.comments.is_empty() && !existing.comments.is_empty() {
                    incoming.comments = std::mem::take(&mut existing.comments);
                }
                *existing = incoming.clone();
            }
            None => self.articles.push(incoming.clone()),
        }
        sort_newest_first(&mut self.articles);
        incoming
    }

    /// Merge a listing fetched with `filter`.
    ///
    /// Articles matching the filter that the listing no longer contains were
    /// removed remotely and are dropped. Others are left alone.
    pub fn merge_articles(&mut self, filter: &ArticleFilter, incoming: Vec<Article>) {
        self.articles
            .retain(|a| !a.matches(filter) || incoming.iter().any(|i| i.id == a.id));
        for article in incoming {
            self.upsert_article(article);
        }
    }

    pub fn remove_article(&mut self, id: i64) -> Option<Article> {
        let index = self.articles.iter().position(|a| a.id == id)?;
        Some(self.articles.remove(index))
    }

    /// Insert or replace a user, keeping a locally known credential when the
    /// incoming copy has none.
    pub fn upsert_user(&mut self, mut incoming: User) -> User {
        match self.user_mut(incoming.id) {
            Some(existing) => {
                if incoming.password.is_none() {
                    incoming.password = existing.password.take();
                }
                *existing = incoming.clone();
            }
            None => self.users.push(incoming.clone()),
        }
        incoming
    }

    /// Replace the user list with the remote one, keeping local credentials.
    pub fn merge_users(&mut self, incoming: Vec<User>) {
        let mut previous = std::mem::take(&mut self.users);
        self.users = incoming
            .into_iter()
            .map(|mut user| {
                if user.password.is_none() {
                    user.password = previous
                        .iter_mut()
                        .find(|p| p.id == user.id)
                        .and_then(|p| p.password.take());
                }
                user
            })
            .collect();
    }

    pub fn upsert_notification(&mut self, incoming: Notification) {
        match self.notification_mut(incoming.id) {
            Some(existing) => *existing = incoming,
            None => self.notifications.push(incoming),
        }
        self.sort_notifications();
    }

    /// Replace one user's notifications with the remote list.
    pub fn merge_notifications(&mut self, user_id: i64, incoming: Vec<Notification>) {
        self.notifications.retain(|n| n.user_id != user_id);
        self.notifications.extend(incoming);
        self.sort_notifications();
    }

    /// A user's notifications, newest first
    pub fn notifications_for(&self, user_id: i64) -> Vec<Notification> {
        self.notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    fn sort_notifications(&mut self) {
        self.notifications
            .sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    }
}
