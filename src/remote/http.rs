//! reqwest implementation of the remote content service

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;

use super::wire::{
    ActiveRequest, ArticleEnvelope, ArticlesEnvelope, CommentEnvelope, CommentsEnvelope,
    CreateArticleRequest, Credentials, DeletedArticleEnvelope, HealthResponse,
    NotificationEnvelope, NotificationQuery, NotificationsEnvelope, PasswordRequest,
    StatusChange, SuccessEnvelope, UserEnvelope, UsersEnvelope,
};
use super::{RemoteContentService, RemoteError, RemoteResult};
use crate::config::RemoteConfig;
use crate::models::{
    Article, ArticleEdit, ArticleFilter, Comment, NewArticle, NewComment, NewNotification,
    NewUser, Notification, User,
};
use crate::workflow::Actor;

/// Error body produced by the server's `ApiError`
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    message: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// Client for the magazine HTTP API
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("revista/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn as_actor(request: RequestBuilder, actor: &Actor) -> RequestBuilder {
        request
            .header("user-id", actor.id.to_string())
            .header("user-role", actor.role.as_str())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| RemoteError::Unavailable(format!("Malformed response: {}", e)));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }
}

/// Map a non-success response to an error.
///
/// 5xx means the service is not usable right now; any 4xx is a definitive
/// answer about the request itself.
fn classify(status: StatusCode, body: &str) -> RemoteError {
    if !status.is_client_error() {
        return RemoteError::Unavailable(format!("HTTP {}: {}", status, body.trim()));
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => {
            let details = match parsed.error.details {
                Some(serde_json::Value::Array(items)) => items
                    .into_iter()
                    .map(|item| match item {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
                _ => Vec::new(),
            };
            tracing::debug!(
                code = %parsed.error.code,
                status = status.as_u16(),
                "Request rejected"
            );
            RemoteError::Rejected {
                status: status.as_u16(),
                message: parsed.error.message,
                details,
            }
        }
        Err(_) => RemoteError::Rejected {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| body.trim().to_string()),
            details: Vec::new(),
        },
    }
}

#[async_trait]
impl RemoteContentService for HttpRemote {
    async fn health(&self) -> RemoteResult<()> {
        let _: HealthResponse = self.send(self.client.get(self.url("/health"))).await?;
        Ok(())
    }

    async fn login(&self, credentials: &Credentials) -> RemoteResult<User> {
        let envelope: UserEnvelope = self
            .send(self.client.post(self.url("/login")).json(credentials))
            .await?;
        Ok(envelope.user)
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> RemoteResult<Vec<Article>> {
        let envelope: ArticlesEnvelope = self
            .send(self.client.get(self.url("/articles")).query(filter))
            .await?;
        Ok(envelope.articles)
    }

    async fn get_article(&self, id: i64) -> RemoteResult<Article> {
        let envelope: ArticleEnvelope = self
            .send(self.client.get(self.url(&format!("/articles/{}", id))))
            .await?;
        Ok(envelope.article)
    }

    async fn create_article(&self, actor: &Actor, article: &NewArticle) -> RemoteResult<Article> {
        let body = CreateArticleRequest {
            author_id: actor.id,
            article: article.clone(),
        };
        let request = self.client.post(self.url("/articles")).json(&body);
        let envelope: ArticleEnvelope = self.send(Self::as_actor(request, actor)).await?;
        Ok(envelope.article)
    }

    async fn update_article(
        &self,
        actor: &Actor,
        id: i64,
        edit: &ArticleEdit,
    ) -> RemoteResult<Article> {
        let request = self
            .client
            .put(self.url(&format!("/articles/{}", id)))
            .json(edit);
        let envelope: ArticleEnvelope = self.send(Self::as_actor(request, actor)).await?;
        Ok(envelope.article)
    }

    async fn change_status(
        &self,
        actor: &Actor,
        id: i64,
        change: &StatusChange,
    ) -> RemoteResult<Article> {
        let request = self
            .client
            .put(self.url(&format!("/articles/{}/status", id)))
            .json(change);
        let envelope: ArticleEnvelope = self.send(Self::as_actor(request, actor)).await?;
        Ok(envelope.article)
    }

    async fn delete_article(&self, actor: &Actor, id: i64) -> RemoteResult<Article> {
        let request = self.client.delete(self.url(&format!("/articles/{}", id)));
        let envelope: DeletedArticleEnvelope = self.send(Self::as_actor(request, actor)).await?;
        Ok(envelope.deleted_article)
    }

    async fn create_comment(&self, article_id: i64, comment: &NewComment) -> RemoteResult<Comment> {
        let envelope: CommentEnvelope = self
            .send(
                self.client
                    .post(self.url(&format!("/articles/{}/comments", article_id)))
                    .json(comment),
            )
            .await?;
        Ok(envelope.comment)
    }

    async fn list_comments(&self, article_id: i64) -> RemoteResult<Vec<Comment>> {
        let envelope: CommentsEnvelope = self
            .send(self.client.get(self.url(&format!("/articles/{}/comments", article_id))))
            .await?;
        Ok(envelope.comments)
    }

    async fn list_users(&self) -> RemoteResult<Vec<User>> {
        let envelope: UsersEnvelope = self.send(self.client.get(self.url("/users"))).await?;
        Ok(envelope.users)
    }

    async fn create_user(&self, actor: &Actor, user: &NewUser) -> RemoteResult<User> {
        let request = self.client.post(self.url("/users")).json(user);
        let envelope: UserEnvelope = self.send(Self::as_actor(request, actor)).await?;
        Ok(envelope.user)
    }

    async fn set_user_active(&self, id: i64, active: bool) -> RemoteResult<User> {
        let envelope: UserEnvelope = self
            .send(
                self.client
                    .put(self.url(&format!("/users/{}/status", id)))
                    .json(&ActiveRequest { active }),
            )
            .await?;
        Ok(envelope.user)
    }

    async fn reset_password(&self, id: i64, password: &str) -> RemoteResult<User> {
        let envelope: UserEnvelope = self
            .send(
                self.client
                    .put(self.url(&format!("/users/{}/password", id)))
                    .json(&PasswordRequest {
                        password: password.to_string(),
                    }),
            )
            .await?;
        Ok(envelope.user)
    }

    async fn list_notifications(&self, user_id: i64) -> RemoteResult<Vec<Notification>> {
        let envelope: NotificationsEnvelope = self
            .send(
                self.client
                    .get(self.url("/notifications"))
                    .query(&NotificationQuery { user_id }),
            )
            .await?;
        Ok(envelope.notifications)
    }

    async fn create_notification(
        &self,
        notification: &NewNotification,
    ) -> RemoteResult<Notification> {
        let envelope: NotificationEnvelope = self
            .send(self.client.post(self.url("/notifications")).json(notification))
            .await?;
        Ok(envelope.notification)
    }

    async fn mark_notification_read(&self, id: i64) -> RemoteResult<Notification> {
        let envelope: NotificationEnvelope = self
            .send(self.client.put(self.url(&format!("/notifications/{}/read", id))))
            .await?;
        Ok(envelope.notification)
    }

    async fn delete_notification(&self, id: i64) -> RemoteResult<()> {
        let _: SuccessEnvelope = self
            .send(self.client.delete(self.url(&format!("/notifications/{}", id))))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_unavailable() {
        let err = classify(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(err.is_unavailable());
        let err = classify(StatusCode::BAD_GATEWAY, "");
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_client_errors_keep_details() {
        let body = r#"{"error":{"code":"VALIDATION_ERROR","message":"Invalid article","details":["Title must be at least 5 characters","Content must be at least 20 characters"]}}"#;
        match classify(StatusCode::BAD_REQUEST, body) {
            RemoteError::Rejected { status, message, details } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid article");
                assert_eq!(details.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_client_error_without_json_body() {
        match classify(StatusCode::NOT_FOUND, "<html>nope</html>") {
            RemoteError::Rejected { status, message, details } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
                assert!(details.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        // Port 9 (discard) on localhost is closed in test environments
        let remote = HttpRemote::new(&RemoteConfig {
            base_url: "http://127.0.0.1:9/api/".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        assert_eq!(remote.base_url(), "http://127.0.0.1:9/api");

        let err = remote.health().await.unwrap_err();
        assert!(err.is_unavailable());
    }
}
