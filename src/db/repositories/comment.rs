//! Comment repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::Comment;

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a comment; content must already be validated and trimmed
    async fn create(&self, article_id: i64, author_id: i64, content: &str) -> Result<Comment>;

    /// Comments on one article, oldest first
    async fn list_by_article(&self, article_id: i64) -> Result<Vec<Comment>>;
}

pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, article_id: i64, author_id: i64, content: &str) -> Result<Comment> {
        let pool = self.pool.sqlite();
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO comments (article_id, author_id, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(author_id)
        .bind(content)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create comment")?;

        let author_name: Option<String> = sqlx::query_scalar("SELECT name FROM users WHERE id = ?")
            .bind(author_id)
            .fetch_optional(pool)
            .await
            .context("Failed to get comment author")?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            article_id,
            author_id,
            author_name,
            content: content.to_string(),
            created_at: now,
        })
    }

    async fn list_by_article(&self, article_id: i64) -> Result<Vec<Comment>> {
        let mut grouped = comments_for_articles_sqlite(self.pool.sqlite(), &[article_id]).await?;
        Ok(grouped.remove(&article_id).unwrap_or_default())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

/// Comments for several articles at once, grouped by article id
pub(crate) async fn comments_for_articles_sqlite(
    pool: &SqlitePool,
    article_ids: &[i64],
) -> Result<HashMap<i64, Vec<Comment>>> {
    let mut grouped: HashMap<i64, Vec<Comment>> = HashMap::new();
    if article_ids.is_empty() {
        return Ok(grouped);
    }

    let placeholders = vec!["?"; article_ids.len()].join(", ");
    let sql = format!(
        r#"
        SELECT c.id, c.article_id, c.author_id, u.name AS author_name, c.content, c.created_at
        FROM comments c
        LEFT JOIN users u ON u.id = c.author_id
        WHERE c.article_id IN ({})
        ORDER BY c.created_at ASC, c.id ASC
        "#,
        placeholders
    );
    let mut query = sqlx::query(&sql);
    for id in article_ids {
        query = query.bind(*id);
    }
    let rows = query.fetch_all(pool).await.context("Failed to list comments")?;

    for row in rows {
        let comment = Comment {
            id: row.get("id"),
            article_id: row.get("article_id"),
            author_id: row.get("author_id"),
            author_name: row.get("author_name"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        };
        grouped.entry(comment.article_id).or_default().push(comment);
    }
    Ok(grouped)
}
