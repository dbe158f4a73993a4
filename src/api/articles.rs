//! Article API endpoints
//!
//! - GET /api/articles - List articles, filtered by status, category, chapter, user_id
//! - GET /api/articles/{id} - Get article with comments
//! - POST /api/articles - Create article (draft or pending)
//! - PUT /api/articles/{id} - Edit article, optionally submitting it
//! - PUT /api/articles/{id}/status - Review workflow transition
//! - DELETE /api/articles/{id} - Delete article (admin only)
//!
//! The transition rules live in `crate::workflow`; handlers load the article,
//! plan the change for the acting user and store the result.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;

use crate::api::middleware::{ActorHeaders, ApiError, AppState};
use crate::api::upload;
use crate::models::{Article, ArticleEdit, ArticleFilter};
use crate::remote::wire::{
    ArticleEnvelope, ArticlesEnvelope, CreateArticleRequest, DeletedArticleEnvelope, StatusChange,
};
use crate::workflow;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles).post(create_article))
        .route(
            "/articles/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/articles/{id}/status", put(change_status))
}

async fn load(state: &AppState, id: i64) -> Result<Article, ApiError> {
    state
        .articles
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))
}

fn envelope(article: Article) -> Json<ArticleEnvelope> {
    Json(ArticleEnvelope {
        success: true,
        image_url: article.image_url.clone(),
        article,
    })
}

/// GET /api/articles
pub async fn list_articles(
    State(state): State<AppState>,
    Query(filter): Query<ArticleFilter>,
) -> Result<Json<ArticlesEnvelope>, ApiError> {
    let articles = state.articles.list(&filter).await?;
    Ok(Json(ArticlesEnvelope {
        success: true,
        articles,
    }))
}

/// GET /api/articles/{id}
pub async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    Ok(envelope(load(&state, id).await?))
}

/// POST /api/articles
///
/// `image_base64` wins over `image_url`. An image that cannot be stored is
/// dropped with a warning and the article is created without it.
pub async fn create_article(
    State(state): State<AppState>,
    Json(body): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ArticleEnvelope>), ApiError> {
    let input = body.article;
    workflow::check_create(&input.title, &input.content, input.status)?;

    if state.users.get_by_id(body.author_id).await?.is_none() {
        return Err(ApiError::validation(vec![format!(
            "Unknown author: {}",
            body.author_id
        )]));
    }

    let image_url = match (&input.image_base64, &input.image_url) {
        (Some(data_url), _) => {
            match upload::save_base64_image(&state.upload_config, &input.title, data_url).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Dropping article image: {}", e);
                    None
                }
            }
        }
        (None, Some(url)) => Some(url.clone()),
        (None, None) => None,
    };

    let article = state.articles.create(body.author_id, &input, image_url).await?;
    tracing::info!(
        article_id = article.id,
        author_id = article.author_id,
        status = %article.status,
        "Article created"
    );
    Ok((StatusCode::CREATED, envelope(article)))
}

/// PUT /api/articles/{id}
pub async fn update_article(
    State(state): State<AppState>,
    actor: ActorHeaders,
    Path(id): Path<i64>,
    Json(edit): Json<ArticleEdit>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    let actor = actor.require()?;
    let mut article = load(&state, id).await?;

    let transition = workflow::plan_edit(&article, &actor, &edit)?;
    workflow::apply_edit(&mut article, &edit, transition.as_ref(), Utc::now());
    let saved = state.articles.save(&article).await?;

    tracing::info!(article_id = id, submitted = transition.is_some(), "Article edited");
    Ok(envelope(saved))
}

/// PUT /api/articles/{id}/status
pub async fn change_status(
    State(state): State<AppState>,
    actor: ActorHeaders,
    Path(id): Path<i64>,
    Json(change): Json<StatusChange>,
) -> Result<Json<ArticleEnvelope>, ApiError> {
    let actor = actor.require()?;
    let mut article = load(&state, id).await?;

    let transition = workflow::plan_transition(
        &article,
        &actor,
        change.status,
        change.rejection_reason.as_deref(),
    )?;
    let from = article.status;
    transition.apply(&mut article, Utc::now());
    let saved = state.articles.save(&article).await?;

    tracing::info!(
        article_id = id,
        from = %from,
        to = %saved.status,
        actor_id = actor.id,
        "Article status changed"
    );
    Ok(envelope(saved))
}

/// DELETE /api/articles/{id}
///
/// Requires `user-role: admin`; comments are removed with the article.
pub async fn delete_article(
    State(state): State<AppState>,
    actor: ActorHeaders,
    Path(id): Path<i64>,
) -> Result<Json<DeletedArticleEnvelope>, ApiError> {
    if !actor.is_admin() {
        return Err(ApiError::forbidden("Only administrators can delete articles"));
    }

    let deleted = state
        .articles
        .delete(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    tracing::info!(article_id = id, "Article deleted");
    Ok(Json(DeletedArticleEnvelope {
        success: true,
        message: format!("Article \"{}\" deleted", deleted.title),
        deleted_article: deleted,
    }))
}
