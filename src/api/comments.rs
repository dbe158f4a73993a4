//! Comment API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::NewComment;
use crate::remote::wire::{CommentEnvelope, CommentsEnvelope};
use crate::workflow;

pub fn router() -> Router<AppState> {
    Router::new().route("/articles/{id}/comments", get(list_comments).post(create_comment))
}

/// GET /api/articles/{id}/comments - oldest first
pub async fn list_comments(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> Result<Json<CommentsEnvelope>, ApiError> {
    if state.articles.get_by_id(article_id).await?.is_none() {
        return Err(ApiError::not_found("Article not found"));
    }
    let comments = state.comments.list_by_article(article_id).await?;
    Ok(Json(CommentsEnvelope {
        success: true,
        comments,
    }))
}

/// POST /api/articles/{id}/comments - published articles only
pub async fn create_comment(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    Json(body): Json<NewComment>,
) -> Result<(StatusCode, Json<CommentEnvelope>), ApiError> {
    let content = workflow::validate_comment(&body.content)?;
    let article = state
        .articles
        .get_by_id(article_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;
    workflow::check_comment(&article)?;
    if state.users.get_by_id(body.author_id).await?.is_none() {
        return Err(ApiError::validation(vec![format!("Unknown author: {}", body.author_id)]));
    }

    let comment = state.comments.create(article_id, body.author_id, content).await?;
    tracing::debug!(article_id, comment_id = comment.id, "Comment added");
    Ok((
        StatusCode::CREATED,
        Json(CommentEnvelope {
            success: true,
            comment,
        }),
    ))
}
