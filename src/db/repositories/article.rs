//! Article repository
//!
//! Database operations for articles. Reads attach the author's display name
//! and the article's comments.
//!
//! Status changes and edits are decided by `crate::workflow` on a loaded
//! article; this module only stores the result with [`ArticleRepository::save`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

use super::comment::comments_for_articles_sqlite;
use crate::db::DynDatabasePool;
use crate::models::{Article, ArticleFilter, ArticleStatus, Chapter, NewArticle, TalentCategory};

/// Article repository trait
#[async_trait]
pub trait ArticleRepository: Send + Sync {
    /// Articles matching every set filter field, newest first
    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>>;

    /// Get article by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    /// Insert a new article written by `author_id`
    async fn create(
        &self,
        author_id: i64,
        input: &NewArticle,
        image_url: Option<String>,
    ) -> Result<Article>;

    /// Store the editable and status fields of an existing article
    async fn save(&self, article: &Article) -> Result<Article>;

    /// Remove an article and its comments, returning what was removed
    async fn delete(&self, id: i64) -> Result<Option<Article>>;
}

/// SQLx-based article repository implementation
pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn list(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        list_articles_sqlite(self.pool.sqlite(), filter).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        get_article_by_id_sqlite(self.pool.sqlite(), id).await
    }

    async fn create(
        &self,
        author_id: i64,
        input: &NewArticle,
        image_url: Option<String>,
    ) -> Result<Article> {
        create_article_sqlite(self.pool.sqlite(), author_id, input, image_url).await
    }

    async fn save(&self, article: &Article) -> Result<Article> {
        save_article_sqlite(self.pool.sqlite(), article).await
    }

    async fn delete(&self, id: i64) -> Result<Option<Article>> {
        delete_article_sqlite(self.pool.sqlite(), id).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const ARTICLE_SELECT: &str = r#"
    SELECT a.id, a.title, a.category, a.chapter, a.content, a.author_id, u.name AS author_name,
           a.image_url, a.status, a.rejection_reason, a.created_at, a.updated_at, a.published_at
    FROM articles a
    LEFT JOIN users u ON u.id = a.author_id
"#;

async fn list_articles_sqlite(pool: &SqlitePool, filter: &ArticleFilter) -> Result<Vec<Article>> {
    let mut conditions = Vec::new();
    if filter.status.is_some() {
        conditions.push("a.status = ?");
    }
    if filter.category.is_some() {
        conditions.push("a.category = ?");
    }
    if filter.chapter.is_some() {
        conditions.push("a.chapter = ?");
    }
    if filter.author_id.is_some() {
        conditions.push("a.author_id = ?");
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!(
        "{} {} ORDER BY a.created_at DESC, a.id DESC",
        ARTICLE_SELECT, where_clause
    );

    let mut query = sqlx::query(&sql);
    if let Some(status) = filter.status {
        query = query.bind(status.as_str());
    }
    if let Some(category) = filter.category {
        query = query.bind(category.as_str());
    }
    if let Some(chapter) = filter.chapter {
        query = query.bind(chapter.as_str());
    }
    if let Some(author_id) = filter.author_id {
        query = query.bind(author_id);
    }

    let rows = query.fetch_all(pool).await.context("Failed to list articles")?;
    let mut articles = rows
        .iter()
        .map(row_to_article_sqlite)
        .collect::<Result<Vec<_>>>()?;

    let ids: Vec<i64> = articles.iter().map(|a| a.id).collect();
    let mut comments = comments_for_articles_sqlite(pool, &ids).await?;
    for article in &mut articles {
        article.comments = comments.remove(&article.id).unwrap_or_default();
    }
    Ok(articles)
}

async fn get_article_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let row = sqlx::query(&format!("{} WHERE a.id = ?", ARTICLE_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get article by ID")?;

    let mut article = match row {
        Some(row) => row_to_article_sqlite(&row)?,
        None => return Ok(None),
    };
    article.comments = comments_for_articles_sqlite(pool, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(Some(article))
}

async fn create_article_sqlite(
    pool: &SqlitePool,
    author_id: i64,
    input: &NewArticle,
    image_url: Option<String>,
) -> Result<Article> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO articles (title, category, chapter, content, author_id, image_url, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.title.trim())
    .bind(input.category.as_str())
    .bind(input.chapter.as_str())
    .bind(input.content.trim())
    .bind(author_id)
    .bind(&image_url)
    .bind(input.status.as_str())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create article")?;

    let id = result.last_insert_rowid();
    get_article_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article {} missing after insert", id))
}

async fn save_article_sqlite(pool: &SqlitePool, article: &Article) -> Result<Article> {
    sqlx::query(
        r#"
        UPDATE articles
        SET title = ?, category = ?, chapter = ?, content = ?, image_url = ?,
            status = ?, rejection_reason = ?, updated_at = ?, published_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&article.title)
    .bind(article.category.as_str())
    .bind(article.chapter.as_str())
    .bind(&article.content)
    .bind(&article.image_url)
    .bind(article.status.as_str())
    .bind(&article.rejection_reason)
    .bind(article.updated_at)
    .bind(article.published_at)
    .bind(article.id)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to save article {}", article.id))?;

    get_article_by_id_sqlite(pool, article.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Article {} missing after update", article.id))
}

async fn delete_article_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Article>> {
    let article = match get_article_by_id_sqlite(pool, id).await? {
        Some(article) => article,
        None => return Ok(None),
    };

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM comments WHERE article_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article comments")?;
    sqlx::query("DELETE FROM articles WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete article")?;
    tx.commit().await?;

    Ok(Some(article))
}

fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let category: String = row.get("category");
    let chapter: String = row.get("chapter");
    let status: String = row.get("status");

    Ok(Article {
        id: row.get("id"),
        title: row.get("title"),
        category: TalentCategory::from_str(&category)?,
        chapter: Chapter::from_str(&chapter)
            .with_context(|| format!("Invalid chapter in database: {}", chapter))?,
        content: row.get("content"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        image_url: row.get("image_url"),
        status: ArticleStatus::from_str(&status)
            .with_context(|| format!("Invalid status in database: {}", status))?,
        rejection_reason: row.get("rejection_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        published_at: row.get("published_at"),
        comments: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{CommentRepository, SqlxCommentRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::workflow::{plan_transition, Actor};
    use crate::models::UserRole;

    async fn pool() -> DynDatabasePool {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool
    }

    fn draft(title: &str, category: TalentCategory) -> NewArticle {
        NewArticle::new(title, category, Chapter::Portfolios, "Plenty of content for this article.")
    }

    #[tokio::test]
    async fn test_create_and_filter() {
        let repo = SqlxArticleRepository::new(pool().await);
        let first = repo.create(3, &draft("First article", TalentCategory::Musical), None).await.unwrap();
        let second = repo
            .create(4, &draft("Second article", TalentCategory::Artistic).submitted(), Some("/images/a.png".into()))
            .await
            .unwrap();
        assert_eq!(first.author_name.as_deref(), Some("Student One"));
        assert_eq!(second.status, ArticleStatus::Pending);
        assert_eq!(second.image_url.as_deref(), Some("/images/a.png"));

        let all = repo.list(&ArticleFilter::default()).await.unwrap();
        assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        let pending = repo
            .list(&ArticleFilter::default().with_status(ArticleStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let mine = repo
            .list(&ArticleFilter::default().with_author(3).with_category(TalentCategory::Musical))
            .await
            .unwrap();
        assert_eq!(mine, vec![first]);
    }

    #[tokio::test]
    async fn test_save_status_change() {
        let repo = SqlxArticleRepository::new(pool().await);
        let mut article = repo
            .create(3, &draft("Waiting for review", TalentCategory::Sporting).submitted(), None)
            .await
            .unwrap();

        let teacher = Actor::new(2, UserRole::Teacher);
        let transition = plan_transition(&article, &teacher, ArticleStatus::Published, None).unwrap();
        transition.apply(&mut article, Utc::now());
        let saved = repo.save(&article).await.unwrap();
        assert_eq!(saved.status, ArticleStatus::Published);
        assert!(saved.published_at.is_some());
        assert!(saved.is_consistent());
    }

    #[tokio::test]
    async fn test_delete_removes_comments() {
        let pool = pool().await;
        let repo = SqlxArticleRepository::new(pool.clone());
        let comments = SqlxCommentRepository::new(pool);
        let mut article = repo.create(3, &draft("Soon deleted", TalentCategory::Linguistic), None).await.unwrap();
        article.status = ArticleStatus::Published;
        article.published_at = Some(Utc::now());
        repo.save(&article).await.unwrap();
        comments.create(article.id, 2, "Nice").await.unwrap();

        let deleted = repo.delete(article.id).await.unwrap().unwrap();
        assert_eq!(deleted.comments.len(), 1);
        assert!(repo.get_by_id(article.id).await.unwrap().is_none());
        assert!(comments.list_by_article(article.id).await.unwrap().is_empty());
        assert!(repo.delete(article.id).await.unwrap().is_none());
    }
}
