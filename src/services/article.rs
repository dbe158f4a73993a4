//! Article service
//!
//! Runs the review workflow through the sync coordinator:
//! - guards are checked against the known article before any remote call
//! - the remote service (or the local fallback) applies the change
//! - the author is notified after publication or rejection

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::NotificationService;
use crate::models::{
    Article, ArticleEdit, ArticleFilter, ArticleStatus, NewArticle, NewNotification,
    NotificationType,
};
use crate::remote::{RemoteContentService, RemoteResult, StatusChange};
use crate::sync::{Collection, Mutation, Query, SessionState, SyncCoordinator, SyncError, Synced};
use crate::workflow::{self, Actor};

/// Article workflow engine
pub struct ArticleService {
    sync: Arc<SyncCoordinator>,
    notifications: Arc<NotificationService>,
}

impl ArticleService {
    pub fn new(sync: Arc<SyncCoordinator>, notifications: Arc<NotificationService>) -> Self {
        Self { sync, notifications }
    }

    /// Create an article as `draft` or straight into review as `pending`
    pub async fn create(
        &self,
        actor: &Actor,
        article: NewArticle,
    ) -> Result<Synced<Article>, SyncError> {
        workflow::check_create(&article.title, &article.content, article.status)?;
        let created = self
            .sync
            .write(CreateArticle {
                actor: *actor,
                article,
            })
            .await?;
        tracing::info!(
            article_id = created.value().id,
            status = %created.value().status,
            local = created.is_local(),
            "Article created"
        );
        Ok(created)
    }

    /// List articles visible to `actor`, newest first.
    ///
    /// Students only ever see their own articles and parents only published
    /// ones, whatever the filter says. Asking explicitly for something
    /// outside that view is refused.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: ArticleFilter,
    ) -> Result<Synced<Vec<Article>>, SyncError> {
        let scoped = workflow::scope_filter(actor, filter).ok_or_else(|| {
            let message = format!("{} accounts cannot list these articles", actor.role);
            SyncError::ForbiddenTransition(message)
        })?;
        self.sync.read(ListArticles { filter: scoped }).await
    }

    /// Fetch one article. Unpublished articles are only visible to those who
    /// could list them.
    pub async fn get(&self, actor: &Actor, id: i64) -> Result<Synced<Article>, SyncError> {
        let article = self.sync.read(GetArticle { id }).await?;
        let visible = article.value().status == ArticleStatus::Published
            || workflow::visible_to(article.value(), actor);
        if !visible {
            return Err(SyncError::NotFound(format!("Article {}", id)));
        }
        Ok(article)
    }

    /// draft → pending
    pub async fn submit(&self, actor: &Actor, id: i64) -> Result<Synced<Article>, SyncError> {
        self.transition(actor, id, ArticleStatus::Pending, None).await
    }

    /// pending → published
    pub async fn approve(&self, actor: &Actor, id: i64) -> Result<Synced<Article>, SyncError> {
        self.transition(actor, id, ArticleStatus::Published, None).await
    }

    /// pending → rejected, with the reviewer's reason
    pub async fn reject(
        &self,
        actor: &Actor,
        id: i64,
        reason: &str,
    ) -> Result<Synced<Article>, SyncError> {
        self.transition(actor, id, ArticleStatus::Rejected, Some(reason)).await
    }

    /// rejected → pending
    pub async fn resubmit(&self, actor: &Actor, id: i64) -> Result<Synced<Article>, SyncError> {
        self.transition(actor, id, ArticleStatus::Pending, None).await
    }

    /// Move an article to `target`, notifying the author on publication or
    /// rejection.
    pub async fn transition(
        &self,
        actor: &Actor,
        id: i64,
        target: ArticleStatus,
        reason: Option<&str>,
    ) -> Result<Synced<Article>, SyncError> {
        let known = self.sync.view(|state| state.article(id).cloned()).await;
        if let Some(article) = &known {
            workflow::plan_transition(article, actor, target, reason)?;
        }

        let change = StatusChange {
            status: target,
            rejection_reason: reason.map(str::to_string),
        };
        let moved = self
            .sync
            .write(ChangeStatus {
                actor: *actor,
                id,
                change,
            })
            .await?;
        tracing::info!(
            article_id = id,
            status = %target,
            local = moved.is_local(),
            "Article status changed"
        );

        if let Some(notification) = review_notification(moved.value()) {
            self.notifications.dispatch(notification).await;
        }
        Ok(moved)
    }

    /// Edit an unpublished article, optionally sending it to review
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        edit: ArticleEdit,
    ) -> Result<Synced<Article>, SyncError> {
        let known = self.sync.view(|state| state.article(id).cloned()).await;
        match &known {
            Some(article) => {
                workflow::plan_edit(article, actor, &edit)?;
            }
            None => workflow::validate_article(&edit.title, &edit.content)?,
        }

        let updated = self
            .sync
            .write(EditArticle {
                actor: *actor,
                id,
                edit,
            })
            .await?;
        tracing::info!(article_id = id, local = updated.is_local(), "Article updated");
        Ok(updated)
    }

    /// Delete an article and its comments. Admin only.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<Synced<Article>, SyncError> {
        workflow::check_delete(actor)?;
        let deleted = self
            .sync
            .write(DeleteArticle { actor: *actor, id })
            .await?;
        tracing::info!(
            article_id = id,
            comments = deleted.value().comments.len(),
            local = deleted.is_local(),
            "Article deleted"
        );
        Ok(deleted)
    }
}

/// Author notification for a reviewer's decision
pub(crate) fn review_notification(article: &Article) -> Option<NewNotification> {
    match article.status {
        ArticleStatus::Published => Some(
            NewNotification::new(
                article.author_id,
                "Article approved",
                format!(
                    "Your article \"{}\" has been published in the magazine",
                    article.title
                ),
                NotificationType::Success,
            )
            .with_link("articles"),
        ),
        ArticleStatus::Rejected => Some(
            NewNotification::new(
                article.author_id,
                "Article needs changes",
                format!(
                    "Your article \"{}\" was rejected. Reason: {}",
                    article.title,
                    article.rejection_reason.as_deref().unwrap_or_default()
                ),
                NotificationType::Danger,
            )
            .with_link("articles"),
        ),
        ArticleStatus::Draft | ArticleStatus::Pending => None,
    }
}

fn not_found(id: i64) -> SyncError {
    SyncError::NotFound(format!("Article {}", id))
}

struct CreateArticle {
    actor: Actor,
    article: NewArticle,
}

#[async_trait]
impl Mutation for CreateArticle {
    type Response = Article;
    type Output = Article;

    fn label(&self) -> &'static str {
        "create_article"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Article> {
        remote.create_article(&self.actor, &self.article).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Article,
    ) -> Result<Article, SyncError> {
        Ok(state.upsert_article(response))
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<Article, SyncError> {
        let new = &self.article;
        workflow::check_create(&new.title, &new.content, new.status)?;
        let article = Article {
            id: state.next_article_id(),
            title: new.title.trim().to_string(),
            category: new.category,
            chapter: new.chapter,
            content: new.content.trim().to_string(),
            author_id: self.actor.id,
            author_name: state.display_name(self.actor.id),
            // Without the server there is nowhere to upload to; keep the data URL
            image_url: new.image_url.clone().or_else(|| new.image_base64.clone()),
            status: new.status,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            published_at: None,
            comments: Vec::new(),
        };
        Ok(state.upsert_article(article))
    }
}

struct ChangeStatus {
    actor: Actor,
    id: i64,
    change: StatusChange,
}

#[async_trait]
impl Mutation for ChangeStatus {
    type Response = Article;
    type Output = Article;

    fn label(&self) -> &'static str {
        "change_article_status"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Article> {
        remote.change_status(&self.actor, self.id, &self.change).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Article,
    ) -> Result<Article, SyncError> {
        Ok(state.upsert_article(response))
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<Article, SyncError> {
        let article = state.article_mut(self.id).ok_or_else(|| not_found(self.id))?;
        let transition = workflow::plan_transition(
            article,
            &self.actor,
            self.change.status,
            self.change.rejection_reason.as_deref(),
        )?;
        transition.apply(article, now);
        Ok(article.clone())
    }
}

struct EditArticle {
    actor: Actor,
    id: i64,
    edit: ArticleEdit,
}

#[async_trait]
impl Mutation for EditArticle {
    type Response = Article;
    type Output = Article;

    fn label(&self) -> &'static str {
        "update_article"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Article> {
        remote.update_article(&self.actor, self.id, &self.edit).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Article,
    ) -> Result<Article, SyncError> {
        Ok(state.upsert_article(response))
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<Article, SyncError> {
        let article = state.article_mut(self.id).ok_or_else(|| not_found(self.id))?;
        let transition = workflow::plan_edit(article, &self.actor, &self.edit)?;
        workflow::apply_edit(article, &self.edit, transition.as_ref(), now);
        Ok(article.clone())
    }
}

struct DeleteArticle {
    actor: Actor,
    id: i64,
}

#[async_trait]
impl Mutation for DeleteArticle {
    type Response = Article;
    type Output = Article;

    fn label(&self) -> &'static str {
        "delete_article"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Article> {
        remote.delete_article(&self.actor, self.id).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Article,
    ) -> Result<Article, SyncError> {
        Ok(state.remove_article(self.id).unwrap_or(response))
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        _now: DateTime<Utc>,
    ) -> Result<Article, SyncError> {
        workflow::check_delete(&self.actor)?;
        state.remove_article(self.id).ok_or_else(|| not_found(self.id))
    }
}

struct ListArticles {
    filter: ArticleFilter,
}

#[async_trait]
impl Query for ListArticles {
    type Response = Vec<Article>;
    type Output = Vec<Article>;

    fn label(&self) -> &'static str {
        "list_articles"
    }

    fn collection(&self) -> Collection {
        Collection::Articles
    }

    async fn fetch(&self, remote: &dyn RemoteContentService) -> RemoteResult<Vec<Article>> {
        remote.list_articles(&self.filter).await
    }

    fn merge(&self, state: &mut SessionState, response: Vec<Article>) {
        state.merge_articles(&self.filter, response);
    }

    fn read(&self, state: &SessionState) -> Result<Vec<Article>, SyncError> {
        Ok(state
            .articles
            .iter()
            .filter(|a| a.matches(&self.filter))
            .cloned()
            .collect())
    }
}

/// Single article lookup, without visibility rules
pub(crate) struct GetArticle {
    pub id: i64,
}

#[async_trait]
impl Query for GetArticle {
    type Response = Article;
    type Output = Article;

    fn label(&self) -> &'static str {
        "get_article"
    }

    fn collection(&self) -> Collection {
        Collection::Articles
    }

    async fn fetch(&self, remote: &dyn RemoteContentService) -> RemoteResult<Article> {
        remote.get_article(self.id).await
    }

    fn merge(&self, state: &mut SessionState, response: Article) {
        state.upsert_article(response);
    }

    fn read(&self, state: &SessionState) -> Result<Article, SyncError> {
        state.article(self.id).cloned().ok_or_else(|| not_found(self.id))
    }
}
