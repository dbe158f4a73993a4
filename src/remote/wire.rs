//! Request and response bodies of the content service API
//!
//! Shared by the reqwest client and the axum handlers so both sides agree on
//! field names. Responses carry a `success` flag for older clients; readers
//! ignore it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Article, ArticleStatus, Comment, NewArticle, Notification, User, UserRole};

/// `POST /login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub role: UserRole,
}

/// `POST /articles`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleRequest {
    pub author_id: i64,
    #[serde(flatten)]
    pub article: NewArticle,
}

/// `PUT /articles/{id}/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: ArticleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

/// `PUT /users/{id}/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

/// `PUT /users/{id}/password`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRequest {
    pub password: String,
}

/// `GET /notifications`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationQuery {
    pub user_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub article: Article,
    /// Resolved image reference, repeated for convenience
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticlesEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedArticleEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub message: String,
    #[serde(rename = "deletedArticle")]
    pub deleted_article: Article,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub comment: Comment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentsEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub notification: Notification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsEnvelope {
    #[serde(default = "success")]
    pub success: bool,
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEnvelope {
    pub success: bool,
}

fn success() -> bool {
    true
}
