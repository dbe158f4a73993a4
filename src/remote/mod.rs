//! Remote content service
//!
//! The client's view of the magazine's HTTP API. Every call can fail in two
//! distinct ways, and callers treat them very differently:
//! - [`RemoteError::Unavailable`]: transport failure, timeout or a 5xx. The
//!   sync coordinator recovers by applying the operation locally.
//! - [`RemoteError::Rejected`]: the service answered with a 4xx. That answer
//!   is authoritative and is passed on to the caller.

pub mod http;
pub mod wire;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::models::{
    Article, ArticleEdit, ArticleFilter, Comment, NewArticle, NewComment, NewNotification,
    NewUser, Notification, User,
};
use crate::workflow::Actor;

pub use http::HttpRemote;
pub use wire::{Credentials, StatusChange};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure talking to the remote content service
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
    #[error("Remote service rejected the request ({status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        details: Vec<String>,
    },
}

impl RemoteError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

/// HTTP API consumed by the client core
///
/// Mutations that depend on who is asking take the acting user, which the
/// HTTP implementation sends as `user-id` / `user-role` headers.
#[async_trait]
pub trait RemoteContentService: Send + Sync {
    /// Liveness probe
    async fn health(&self) -> RemoteResult<()>;

    async fn login(&self, credentials: &Credentials) -> RemoteResult<User>;

    async fn list_articles(&self, filter: &ArticleFilter) -> RemoteResult<Vec<Article>>;

    async fn get_article(&self, id: i64) -> RemoteResult<Article>;

    async fn create_article(&self, actor: &Actor, article: &NewArticle) -> RemoteResult<Article>;

    async fn update_article(
        &self,
        actor: &Actor,
        id: i64,
        edit: &ArticleEdit,
    ) -> RemoteResult<Article>;

    async fn change_status(
        &self,
        actor: &Actor,
        id: i64,
        change: &StatusChange,
    ) -> RemoteResult<Article>;

    /// Deletes the article and its comments; returns the deleted article
    async fn delete_article(&self, actor: &Actor, id: i64) -> RemoteResult<Article>;

    async fn create_comment(&self, article_id: i64, comment: &NewComment) -> RemoteResult<Comment>;

    async fn list_comments(&self, article_id: i64) -> RemoteResult<Vec<Comment>>;

    async fn list_users(&self) -> RemoteResult<Vec<User>>;

    async fn create_user(&self, actor: &Actor, user: &NewUser) -> RemoteResult<User>;

    async fn set_user_active(&self, id: i64, active: bool) -> RemoteResult<User>;

    async fn reset_password(&self, id: i64, password: &str) -> RemoteResult<User>;

    async fn list_notifications(&self, user_id: i64) -> RemoteResult<Vec<Notification>>;

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> RemoteResult<Notification>;

    async fn mark_notification_read(&self, id: i64) -> RemoteResult<Notification>;

    async fn delete_notification(&self, id: i64) -> RemoteResult<()>;
}
