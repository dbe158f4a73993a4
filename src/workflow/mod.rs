//! Article review workflow
//!
//! Pure rules shared by the client services and the HTTP server:
//! - content validation (every violated rule is reported)
//! - the status state machine and who may move an article where
//! - role-based visibility for listings
//!
//! Nothing here performs I/O. Callers plan a [`Transition`] against the
//! current article, then apply it to their own copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::models::{Article, ArticleEdit, ArticleFilter, ArticleStatus, User, UserRole};

pub const TITLE_LENGTH: RangeInclusive<usize> = 5..=100;
pub const CONTENT_LENGTH: RangeInclusive<usize> = 20..=2000;
pub const COMMENT_LENGTH: RangeInclusive<usize> = 1..=500;

/// Workflow rule violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("Forbidden transition: {0}")]
    ForbiddenTransition(String),
    #[error("{0} not found")]
    NotFound(String),
}

/// The user performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: i64, role: UserRole) -> Self {
        Self { id, role }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            role: user.role,
        }
    }
}

/// Every rule the title and content break, in a stable order.
pub fn article_violations(title: &str, content: &str) -> Vec<String> {
    let mut errors = Vec::new();
    let title_len = title.trim().chars().count();
    let content_len = content.trim().chars().count();

    if title_len < *TITLE_LENGTH.start() {
        errors.push(format!("Title must be at least {} characters", TITLE_LENGTH.start()));
    }
    if title_len > *TITLE_LENGTH.end() {
        errors.push(format!("Title cannot exceed {} characters", TITLE_LENGTH.end()));
    }
    if content_len < *CONTENT_LENGTH.start() {
        errors.push(format!("Content must be at least {} characters", CONTENT_LENGTH.start()));
    }
    if content_len > *CONTENT_LENGTH.end() {
        errors.push(format!("Content cannot exceed {} characters", CONTENT_LENGTH.end()));
    }
    errors
}

pub fn validate_article(title: &str, content: &str) -> Result<(), WorkflowError> {
    let errors = article_violations(title, content);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation(errors))
    }
}

/// Returns the trimmed comment text.
pub fn validate_comment(content: &str) -> Result<&str, WorkflowError> {
    let trimmed = content.trim();
    let len = trimmed.chars().count();
    if len < *COMMENT_LENGTH.start() {
        return Err(WorkflowError::Validation(vec!["Comment cannot be empty".to_string()]));
    }
    if len > *COMMENT_LENGTH.end() {
        return Err(WorkflowError::Validation(vec![format!(
            "Comment cannot exceed {} characters",
            COMMENT_LENGTH.end()
        )]));
    }
    Ok(trimmed)
}

/// Guard for creating an article with the requested initial status.
pub fn check_create(
    title: &str,
    content: &str,
    status: ArticleStatus,
) -> Result<(), WorkflowError> {
    if !matches!(status, ArticleStatus::Draft | ArticleStatus::Pending) {
        return Err(WorkflowError::ForbiddenTransition(format!(
            "new articles start as draft or pending, not {}",
            status
        )));
    }
    validate_article(title, content)
}

/// A legal status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// draft → pending, by the author
    Submit,
    /// pending → published, by a reviewer
    Publish,
    /// pending → rejected, by a reviewer
    Reject { reason: String },
    /// rejected → pending, by the author
    Resubmit,
}

impl Transition {
    pub fn target(&self) -> ArticleStatus {
        match self {
            Transition::Submit | Transition::Resubmit => ArticleStatus::Pending,
            Transition::Publish => ArticleStatus::Published,
            Transition::Reject { .. } => ArticleStatus::Rejected,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Publish => "publish",
            Transition::Reject { .. } => "reject",
            Transition::Resubmit => "resubmit",
        }
    }

    /// Move the article and clear whatever contradicts the new status.
    pub fn apply(&self, article: &mut Article, at: DateTime<Utc>) {
        article.status = self.target();
        article.updated_at = at;
        match self {
            Transition::Submit | Transition::Resubmit => {
                article.published_at = None;
                article.rejection_reason = None;
            }
            Transition::Publish => {
                article.published_at = Some(at);
                article.rejection_reason = None;
            }
            Transition::Reject { reason } => {
                article.published_at = None;
                article.rejection_reason = Some(reason.clone());
            }
        }
    }
}

/// Decide whether `actor` may move `article` to `target`.
pub fn plan_transition(
    article: &Article,
    actor: &Actor,
    target: ArticleStatus,
    reason: Option<&str>,
) -> Result<Transition, WorkflowError> {
    use ArticleStatus::*;

    let is_author = actor.id == article.author_id;
    match (article.status, target) {
        (Draft, Pending) => {
            if !is_author {
                return Err(forbidden("only the author can submit a draft"));
            }
            validate_article(&article.title, &article.content)?;
            Ok(Transition::Submit)
        }
        (Rejected, Pending) => {
            if !is_author {
                return Err(forbidden("only the original author can resubmit"));
            }
            validate_article(&article.title, &article.content)?;
            Ok(Transition::Resubmit)
        }
        (Pending, Published) => {
            if !actor.role.can_review() {
                return Err(forbidden("only teachers and admins can publish"));
            }
            Ok(Transition::Publish)
        }
        (Pending, Rejected) => {
            if !actor.role.can_review() {
                return Err(forbidden("only teachers and admins can reject"));
            }
            match reason {
                Some(reason) if !reason.trim().is_empty() => Ok(Transition::Reject {
                    reason: reason.to_string(),
                }),
                _ => Err(WorkflowError::Validation(vec![
                    "A rejection reason is required".to_string(),
                ])),
            }
        }
        (from, to) => Err(forbidden(&format!("{} → {} is not allowed", from, to))),
    }
}

/// Check an edit and work out the status change it implies, if any.
pub fn plan_edit(
    article: &Article,
    actor: &Actor,
    edit: &ArticleEdit,
) -> Result<Option<Transition>, WorkflowError> {
    if actor.id != article.author_id {
        return Err(forbidden("only the author can edit an article"));
    }
    if article.status == ArticleStatus::Published {
        return Err(forbidden("published articles cannot be edited"));
    }
    validate_article(&edit.title, &edit.content)?;

    if !edit.submit {
        return Ok(None);
    }
    Ok(match article.status {
        ArticleStatus::Draft => Some(Transition::Submit),
        ArticleStatus::Rejected => Some(Transition::Resubmit),
        _ => None,
    })
}

/// Apply an already-planned edit.
pub fn apply_edit(
    article: &mut Article,
    edit: &ArticleEdit,
    transition: Option<&Transition>,
    at: DateTime<Utc>,
) {
    article.title = edit.title.trim().to_string();
    article.category = edit.category;
    article.chapter = edit.chapter;
    article.content = edit.content.trim().to_string();
    if edit.image_url.is_some() {
        article.image_url = edit.image_url.clone();
    }
    article.updated_at = at;
    if let Some(transition) = transition {
        transition.apply(article, at);
    }
}

pub fn check_delete(actor: &Actor) -> Result<(), WorkflowError> {
    if actor.role == UserRole::Admin {
        Ok(())
    } else {
        Err(forbidden("only admins can delete articles"))
    }
}

pub fn check_comment(article: &Article) -> Result<(), WorkflowError> {
    if article.status == ArticleStatus::Published {
        Ok(())
    } else {
        Err(forbidden("comments are only accepted on published articles"))
    }
}

/// Narrow a requested filter to what the actor may see.
///
/// Returns `None` when the request asks for something outside the actor's
/// view (a student filtering by another author, a parent asking for drafts).
pub fn scope_filter(actor: &Actor, filter: ArticleFilter) -> Option<ArticleFilter> {
    let mut scoped = filter;
    match actor.role {
        UserRole::Student => match filter.author_id {
            Some(id) if id != actor.id => return None,
            _ => scoped.author_id = Some(actor.id),
        },
        UserRole::Parent => match filter.status {
            Some(status) if status != ArticleStatus::Published => return None,
            _ => scoped.status = Some(ArticleStatus::Published),
        },
        UserRole::Teacher | UserRole::Admin => {}
    }
    Some(scoped)
}

pub fn visible_to(article: &Article, actor: &Actor) -> bool {
    match actor.role {
        UserRole::Student => article.author_id == actor.id,
        UserRole::Parent => article.status == ArticleStatus::Published,
        UserRole::Teacher | UserRole::Admin => true,
    }
}

/// Most recently created first; ties broken by the higher id.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Local id allocation: one more than the largest id, or 1.
pub fn next_id(ids: impl IntoIterator<Item = i64>) -> i64 {
    ids.into_iter().max().map_or(1, |max| max + 1)
}

fn forbidden(message: &str) -> WorkflowError {
    WorkflowError::ForbiddenTransition(message.to_string())
}
