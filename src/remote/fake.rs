//! In-process remote service for tests, with an on/off switch

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::wire::{Credentials, StatusChange};
use super::{RemoteContentService, RemoteError, RemoteResult};
use crate::models::{
    Article, ArticleEdit, ArticleFilter, Comment, NewArticle, NewComment, NewNotification,
    NewUser, Notification, User, UserRole,
};
use crate::workflow::{self, Actor, WorkflowError};

#[derive(Default)]
struct Data {
    users: Vec<User>,
    articles: Vec<Article>,
    notifications: Vec<Notification>,
}

pub(crate) struct FakeRemote {
    online: AtomicBool,
    data: Mutex<Data>,
}

fn rejected(err: WorkflowError) -> RemoteError {
    match err {
        WorkflowError::Validation(details) => RemoteError::Rejected {
            status: 400,
            message: "Validation failed".to_string(),
            details,
        },
        WorkflowError::ForbiddenTransition(message) => RemoteError::Rejected {
            status: 403,
            message,
            details: Vec::new(),
        },
        WorkflowError::NotFound(what) => not_found(&what),
    }
}

fn not_found(what: &str) -> RemoteError {
    RemoteError::Rejected {
        status: 404,
        message: format!("{} not found", what),
        details: Vec::new(),
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            data: Mutex::new(Data::default()),
        }
    }

    /// The server's default accounts
    pub async fn with_seed_users() -> Self {
        let remote = Self::new();
        for (id, username, password, name, role) in [
            (1, "admin", "admin", "Administrator", UserRole::Admin),
            (2, "docente1", "123", "Teacher One", UserRole::Teacher),
            (3, "estudiante1", "123", "Student One", UserRole::Student),
            (4, "estudiante2", "123", "Student Two", UserRole::Student),
            (5, "padre1", "123", "Parent One", UserRole::Parent),
        ] {
            remote
                .insert_user(User {
                    id,
                    username: username.to_string(),
                    password: Some(password.to_string()),
                    name: name.to_string(),
                    role,
                    talent: None,
                    active: true,
                    last_login: None,
                })
                .await;
        }
        remote
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub async fn insert_user(&self, user: User) {
        self.data.lock().await.users.push(user);
    }

    pub async fn insert_article(&self, article: Article) {
        self.data.lock().await.articles.push(article);
    }

    pub async fn article(&self, id: i64) -> Option<Article> {
        self.data.lock().await.articles.iter().find(|a| a.id == id).cloned()
    }

    pub async fn notifications_for(&self, user_id: i64) -> Vec<Notification> {
        self.data
            .lock()
            .await
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect()
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unavailable("connection refused".to_string()))
        }
    }
}

impl Data {
    fn article_mut(&mut self, id: i64) -> RemoteResult<&mut Article> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| not_found("Article"))
    }

    fn user_mut(&mut self, id: i64) -> RemoteResult<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| not_found("User"))
    }

    fn name_of(&self, id: i64) -> Option<String> {
        self.users.iter().find(|u| u.id == id).map(|u| u.name.clone())
    }
}

#[async_trait]
impl RemoteContentService for FakeRemote {
    async fn health(&self) -> RemoteResult<()> {
        self.check_online()
    }

    async fn login(&self, credentials: &Credentials) -> RemoteResult<User> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let user = data
            .users
            .iter_mut()
            .find(|u| {
                u.username == credentials.username
                    && u.password.as_deref() == Some(credentials.password.as_str())
                    && u.role == credentials.role
                    && u.active
            })
            .ok_or_else(|| RemoteError::Rejected {
                status: 401,
                message: "Invalid credentials".to_string(),
                details: Vec::new(),
            })?;
        user.last_login = Some(Utc::now());
        Ok(user.without_password())
    }

    async fn list_articles(&self, filter: &ArticleFilter) -> RemoteResult<Vec<Article>> {
        self.check_online()?;
        let data = self.data.lock().await;
        let mut articles: Vec<Article> = data
            .articles
            .iter()
            .filter(|a| a.matches(filter))
            .cloned()
            .collect();
        workflow::sort_newest_first(&mut articles);
        Ok(articles)
    }

    async fn get_article(&self, id: i64) -> RemoteResult<Article> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        data.article_mut(id).map(|a| a.clone())
    }

    async fn create_article(&self, actor: &Actor, new: &NewArticle) -> RemoteResult<Article> {
        self.check_online()?;
        workflow::check_create(&new.title, &new.content, new.status).map_err(rejected)?;
        let mut data = self.data.lock().await;
        let now = Utc::now();
        let article = Article {
            id: workflow::next_id(data.articles.iter().map(|a| a.id)),
            title: new.title.trim().to_string(),
            category: new.category,
            chapter: new.chapter,
            content: new.content.trim().to_string(),
            author_id: actor.id,
            author_name: data.name_of(actor.id),
            image_url: new.image_url.clone(),
            status: new.status,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
            published_at: None,
            comments: Vec::new(),
        };
        data.articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        actor: &Actor,
        id: i64,
        edit: &ArticleEdit,
    ) -> RemoteResult<Article> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let article = data.article_mut(id)?;
        let transition = workflow::plan_edit(article, actor, edit).map_err(rejected)?;
        workflow::apply_edit(article, edit, transition.as_ref(), Utc::now());
        Ok(article.clone())
    }

    async fn change_status(
        &self,
        actor: &Actor,
        id: i64,
        change: &StatusChange,
    ) -> RemoteResult<Article> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let article = data.article_mut(id)?;
        let transition = workflow::plan_transition(
            article,
            actor,
            change.status,
            change.rejection_reason.as_deref(),
        )
        .map_err(rejected)?;
        transition.apply(article, Utc::now());
        Ok(article.clone())
    }

    async fn delete_article(&self, actor: &Actor, id: i64) -> RemoteResult<Article> {
        self.check_online()?;
        workflow::check_delete(actor).map_err(rejected)?;
        let mut data = self.data.lock().await;
        let index = data
            .articles
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| not_found("Article"))?;
        Ok(data.articles.remove(index))
    }

    async fn create_comment(&self, article_id: i64, new: &NewComment) -> RemoteResult<Comment> {
        self.check_online()?;
        let content = workflow::validate_comment(&new.content).map_err(rejected)?.to_string();
        let mut data = self.data.lock().await;
        let id = workflow::next_id(
            data.articles
                .iter()
                .flat_map(|a| a.comments.iter().map(|c| c.id)),
        );
        let author_name = data.name_of(new.author_id);
        let article = data.article_mut(article_id)?;
        workflow::check_comment(article).map_err(rejected)?;
        let comment = Comment {
            id,
            article_id,
            author_id: new.author_id,
            author_name,
            content,
            created_at: Utc::now(),
        };
        article.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, article_id: i64) -> RemoteResult<Vec<Comment>> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        Ok(data.article_mut(article_id)?.comments.clone())
    }

    async fn list_users(&self) -> RemoteResult<Vec<User>> {
        self.check_online()?;
        let data = self.data.lock().await;
        Ok(data.users.iter().map(User::without_password).collect())
    }

    async fn create_user(&self, _actor: &Actor, new: &NewUser) -> RemoteResult<User> {
        self.check_online()?;
        let violations = new.violations();
        if !violations.is_empty() {
            return Err(rejected(WorkflowError::Validation(violations)));
        }
        let mut data = self.data.lock().await;
        if data.users.iter().any(|u| u.username == new.username) {
            return Err(rejected(WorkflowError::Validation(vec![
                "Username already exists".to_string(),
            ])));
        }
        let user = User {
            id: workflow::next_id(data.users.iter().map(|u| u.id)),
            username: new.username.clone(),
            password: Some(new.password.clone()),
            name: new.name.clone(),
            role: new.role,
            talent: new.effective_talent(),
            active: true,
            last_login: None,
        };
        data.users.push(user.clone());
        Ok(user.without_password())
    }

    async fn set_user_active(&self, id: i64, active: bool) -> RemoteResult<User> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let user = data.user_mut(id)?;
        user.active = active;
        Ok(user.without_password())
    }

    async fn reset_password(&self, id: i64, password: &str) -> RemoteResult<User> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let user = data.user_mut(id)?;
        user.password = Some(password.to_string());
        Ok(user.without_password())
    }

    async fn list_notifications(&self, user_id: i64) -> RemoteResult<Vec<Notification>> {
        self.check_online()?;
        let mut list = self.notifications_for(user_id).await;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn create_notification(&self, new: &NewNotification) -> RemoteResult<Notification> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let notification = Notification {
            id: workflow::next_id(data.notifications.iter().map(|n| n.id)),
            user_id: new.user_id,
            title: new.title.clone(),
            content: new.content.clone(),
            kind: new.kind,
            read: false,
            link: new.link.clone(),
            created_at: Utc::now(),
        };
        data.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn mark_notification_read(&self, id: i64) -> RemoteResult<Notification> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let notification = data
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| not_found("Notification"))?;
        notification.read = true;
        Ok(notification.clone())
    }

    async fn delete_notification(&self, id: i64) -> RemoteResult<()> {
        self.check_online()?;
        let mut data = self.data.lock().await;
        let before = data.notifications.len();
        data.notifications.retain(|n| n.id != id);
        if data.notifications.len() == before {
            return Err(not_found("Notification"));
        }
        Ok(())
    }
}
