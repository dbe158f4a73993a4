//! Comment service

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::article::GetArticle;
use super::NotificationService;
use crate::models::{Comment, NewComment, NewNotification, NotificationType};
use crate::remote::{RemoteContentService, RemoteResult};
use crate::sync::{Collection, Mutation, Query, SessionState, SyncCoordinator, SyncError, Synced};
use crate::workflow::{self, Actor};

/// Comments on published articles
pub struct CommentService {
    sync: Arc<SyncCoordinator>,
    notifications: Arc<NotificationService>,
}

/// Who to tell about a new comment
struct ArticleRef {
    author_id: i64,
    title: String,
}

impl CommentService {
    pub fn new(sync: Arc<SyncCoordinator>, notifications: Arc<NotificationService>) -> Self {
        Self { sync, notifications }
    }

    /// Comment on a published article.
    ///
    /// The article's author is notified unless they wrote the comment.
    pub async fn add(
        &self,
        actor: &Actor,
        article_id: i64,
        content: &str,
    ) -> Result<Synced<Comment>, SyncError> {
        let content = workflow::validate_comment(content)?.to_string();
        let known = self.sync.view(|state| state.article(article_id).cloned()).await;
        if let Some(article) = &known {
            workflow::check_comment(article)?;
        }

        let (comment, target) = self
            .sync
            .write(CreateComment {
                article_id,
                comment: NewComment {
                    author_id: actor.id,
                    content,
                },
            })
            .await
            .map(split)?;
        tracing::info!(
            article_id,
            comment_id = comment.value().id,
            local = comment.is_local(),
            "Comment added"
        );

        let target = match target {
            Some(target) => Some(target),
            None => self.lookup(article_id).await,
        };
        if let Some(target) = target.filter(|t| t.author_id != actor.id) {
            let notification = NewNotification::new(
                target.author_id,
                "New comment",
                format!("Your article \"{}\" has a new comment", target.title),
                NotificationType::Info,
            )
            .with_link("article-detail");
            self.notifications.dispatch(notification).await;
        }
        Ok(comment)
    }

    /// Comments of an article, oldest first
    pub async fn list(&self, article_id: i64) -> Result<Synced<Vec<Comment>>, SyncError> {
        self.sync.read(ListComments { article_id }).await
    }

    async fn lookup(&self, article_id: i64) -> Option<ArticleRef> {
        match self.sync.read(GetArticle { id: article_id }).await {
            Ok(article) => {
                let article = article.into_inner();
                Some(ArticleRef {
                    author_id: article.author_id,
                    title: article.title,
                })
            }
            Err(e) => {
                tracing::warn!(article_id, "Cannot resolve commented article: {}", e);
                None
            }
        }
    }
}

fn split(synced: Synced<(Comment, Option<ArticleRef>)>) -> (Synced<Comment>, Option<ArticleRef>) {
    match synced {
        Synced::Remote((comment, target)) => (Synced::Remote(comment), target),
        Synced::Local((comment, target)) => (Synced::Local(comment), target),
    }
}

fn article_ref(state: &SessionState, article_id: i64) -> Option<ArticleRef> {
    state.article(article_id).map(|a| ArticleRef {
        author_id: a.author_id,
        title: a.title.clone(),
    })
}

struct CreateComment {
    article_id: i64,
    comment: NewComment,
}

#[async_trait]
impl Mutation for CreateComment {
    type Response = Comment;
    type Output = (Comment, Option<ArticleRef>);

    fn label(&self) -> &'static str {
        "create_comment"
    }

    async fn send(&self, remote: &dyn RemoteContentService) -> RemoteResult<Comment> {
        remote.create_comment(self.article_id, &self.comment).await
    }

    fn apply_remote(
        &self,
        state: &mut SessionState,
        response: Comment,
    ) -> Result<Self::Output, SyncError> {
        if let Some(article) = state.article_mut(self.article_id) {
            if !article.comments.iter().any(|c| c.id == response.id) {
                article.comments.push(response.clone());
            }
        }
        Ok((response, article_ref(state, self.article_id)))
    }

    fn apply_local(
        &self,
        state: &mut SessionState,
        now: DateTime<Utc>,
    ) -> Result<Self::Output, SyncError> {
        let content = workflow::validate_comment(&self.comment.content)?.to_string();
        let id = state.next_comment_id();
        let author_name = state.display_name(self.comment.author_id);
        let article = state
            .article_mut(self.article_id)
            .ok_or_else(|| SyncError::NotFound(format!("Article {}", self.article_id)))?;
        workflow::check_comment(article)?;

        let comment = Comment {
            id,
            article_id: self.article_id,
            author_id: self.comment.author_id,
            author_name,
            content,
            created_at: now,
        };
        article.comments.push(comment.clone());
        Ok((comment, article_ref(state, self.article_id)))
    }
}

struct ListComments {
    article_id: i64,
}

#[async_trait]
impl Query for ListComments {
    type Response = Vec<Comment>;
    type Output = Vec<Comment>;

    fn label(&self) -> &'static str {
        "list_comments"
    }

    fn collection(&self) -> Collection {
        Collection::Articles
    }

    async fn fetch(&self, remote: &dyn RemoteContentService) -> RemoteResult<Vec<Comment>> {
        remote.list_comments(self.article_id).await
    }

    fn merge(&self, state: &mut SessionState, response: Vec<Comment>) {
        if let Some(article) = state.article_mut(self.article_id) {
            article.comments = response;
        }
    }

    fn read(&self, state: &SessionState) -> Result<Vec<Comment>, SyncError> {
        state
            .article(self.article_id)
            .map(|a| a.comments.clone())
            .ok_or_else(|| SyncError::NotFound(format!("Article {}", self.article_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{LocalStore, MemoryStore};
    use crate::models::{Chapter, NewArticle, TalentCategory, UserRole};
    use crate::remote::fake::FakeRemote;
    use crate::services::ArticleService;

    const AUTHOR: Actor = Actor { id: 3, role: UserRole::Student };
    const TEACHER: Actor = Actor { id: 2, role: UserRole::Teacher };
    const PARENT: Actor = Actor { id: 5, role: UserRole::Parent };

    struct Fixture {
        remote: Arc<FakeRemote>,
        articles: ArticleService,
        comments: CommentService,
        notifications: Arc<NotificationService>,
    }

    async fn fixture() -> Fixture {
        let remote = Arc::new(FakeRemote::with_seed_users().await);
        let store = Arc::new(LocalStore::Memory(MemoryStore::new()));
        let sync = Arc::new(SyncCoordinator::new(remote.clone(), store));
        let notifications = Arc::new(NotificationService::new(sync.clone()));
        Fixture {
            remote,
            articles: ArticleService::new(sync.clone(), notifications.clone()),
            comments: CommentService::new(sync, notifications.clone()),
            notifications,
        }
    }

    async fn published(f: &Fixture) -> i64 {
        let article = NewArticle::new(
            "Published piece",
            TalentCategory::Sporting,
            Chapter::Experiences,
            "Enough content to pass validation.",
        )
        .submitted();
        let id = f.articles.create(&AUTHOR, article).await.unwrap().into_inner().id;
        f.articles.approve(&TEACHER, id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_comment_notifies_author_only_when_someone_else_comments() {
        let f = fixture().await;
        let id = published(&f).await;
        let before = f.notifications.unread_count(AUTHOR.id).await;

        f.comments.add(&AUTHOR, id, "My own note").await.unwrap();
        assert_eq!(f.notifications.unread_count(AUTHOR.id).await, before);

        let comment = f.comments.add(&PARENT, id, "  Lovely work  ").await.unwrap().into_inner();
        assert_eq!(comment.content, "Lovely work");
        assert_eq!(comment.author_name.as_deref(), Some("Parent One"));

        let inbox = f.notifications.list(AUTHOR.id).await.unwrap().into_inner();
        assert_eq!(inbox[0].title, "New comment");
        assert_eq!(inbox[0].link.as_deref(), Some("article-detail"));
        assert_eq!(inbox[0].kind, NotificationType::Info);

        let listed = f.comments.list(id).await.unwrap().into_inner();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_and_unpublished_comments_refused() {
        let f = fixture().await;
        let err = f.comments.add(&PARENT, 1, "   ").await.unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));

        let draft = NewArticle::new(
            "Still a draft",
            TalentCategory::Sporting,
            Chapter::Experiences,
            "Enough content to pass validation.",
        );
        let id = f.articles.create(&AUTHOR, draft).await.unwrap().into_inner().id;
        let err = f.comments.add(&TEACHER, id, "Too early").await.unwrap_err();
        assert!(matches!(err, SyncError::ForbiddenTransition(_)));
    }

    #[tokio::test]
    async fn test_offline_comments_get_distinct_increasing_ids() {
        let f = fixture().await;
        let id = published(&f).await;
        f.comments.list(id).await.unwrap();
        f.remote.set_online(false);

        let first = f.comments.add(&PARENT, id, "First offline").await.unwrap();
        let second = f.comments.add(&TEACHER, id, "Second offline").await.unwrap();
        assert!(first.is_local() && second.is_local());
        assert!(second.value().id > first.value().id);

        let listed = f.comments.list(id).await.unwrap();
        assert!(listed.is_local());
        assert_eq!(listed.value().len(), 2);
    }

    #[tokio::test]
    async fn test_comment_on_unknown_article_online() {
        let f = fixture().await;
        let err = f.comments.add(&PARENT, 99, "Hello").await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
