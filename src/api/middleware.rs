//! Shared API plumbing
//!
//! - `AppState`: repositories and upload settings handed to every handler
//! - `ApiError`: the `{error: {code, message, details}}` body and its status
//! - `ActorHeaders`: the acting user carried in `user-id` / `user-role`

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::UploadConfig;
use crate::db::repositories::{
    ArticleRepository, CommentRepository, NotificationRepository, UserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::UserRole;
use crate::workflow::{Actor, WorkflowError};

/// Application state containing shared repositories
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub users: Arc<dyn UserRepository>,
    pub articles: Arc<dyn ArticleRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub upload_config: Arc<UploadConfig>,
}

impl AppState {
    pub fn new(pool: DynDatabasePool, upload_config: UploadConfig) -> Self {
        use crate::db::repositories::{
            SqlxArticleRepository, SqlxCommentRepository, SqlxNotificationRepository,
            SqlxUserRepository,
        };
        Self {
            users: SqlxUserRepository::boxed(pool.clone()),
            articles: SqlxArticleRepository::boxed(pool.clone()),
            comments: SqlxCommentRepository::boxed(pool.clone()),
            notifications: SqlxNotificationRepository::boxed(pool.clone()),
            upload_config: Arc::new(upload_config),
            pool,
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    /// Every violated rule goes in `details`
    pub fn validation(errors: Vec<String>) -> Self {
        Self::with_details("VALIDATION_ERROR", "Validation failed", serde_json::json!(errors))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(errors) => Self::validation(errors),
            WorkflowError::ForbiddenTransition(message) => Self::forbidden(message),
            WorkflowError::NotFound(what) => Self::not_found(format!("{} not found", what)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::internal_error("Internal server error")
    }
}

/// Acting user as declared by the client headers
///
/// The headers are trusted as sent; there is no session check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActorHeaders {
    pub id: Option<i64>,
    pub role: Option<UserRole>,
}

impl ActorHeaders {
    /// Both headers present and well formed
    pub fn require(&self) -> Result<Actor, ApiError> {
        match (self.id, self.role) {
            (Some(id), Some(role)) => Ok(Actor::new(id, role)),
            _ => Err(ApiError::unauthorized("Missing user-id or user-role header")),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(UserRole::Admin)
    }
}

impl<S> FromRequestParts<S> for ActorHeaders
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        };
        Ok(Self {
            id: header("user-id").and_then(|v| v.parse().ok()),
            role: header("user-role").and_then(|v| UserRole::from_str(v).ok()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn test_actor_headers() {
        let (mut parts, _) = Request::builder()
            .header("user-id", "3")
            .header("user-role", "Student")
            .body(())
            .unwrap()
            .into_parts();
        let headers = ActorHeaders::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(headers.require().unwrap(), Actor::new(3, UserRole::Student));
        assert!(!headers.is_admin());

        let (mut parts, _) = Request::builder()
            .header("user-role", "janitor")
            .body(())
            .unwrap()
            .into_parts();
        let headers = ActorHeaders::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(headers.require().unwrap_err().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_workflow_errors_map_to_status() {
        let err: ApiError = WorkflowError::Validation(vec!["a".into(), "b".into()]).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error.details, Some(serde_json::json!(["a", "b"])));

        let err: ApiError = WorkflowError::ForbiddenTransition("no".into()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: ApiError = WorkflowError::NotFound("Article".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.error.message, "Article not found");
    }
}
