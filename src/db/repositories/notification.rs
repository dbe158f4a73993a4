//! Notification repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

use crate::db::DynDatabasePool;
use crate::models::{NewNotification, Notification, NotificationType};

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// A user's notifications, newest first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Notification>>;

    async fn create(&self, input: &NewNotification) -> Result<Notification>;

    /// Set the read flag, returning the updated notification
    async fn mark_read(&self, id: i64) -> Result<Option<Notification>>;

    /// Returns false if nothing was deleted
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Notification>> {
        let row = sqlx::query(
            "SELECT id, user_id, title, content, type, read, link, created_at FROM notifications WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool.sqlite())
        .await
        .context("Failed to get notification")?;
        row.as_ref().map(row_to_notification_sqlite).transpose()
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, title, content, type, read, link, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.sqlite())
        .await
        .context("Failed to list notifications")?;
        rows.iter().map(row_to_notification_sqlite).collect()
    }

    async fn create(&self, input: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, title, content, type, read, link, created_at)
            VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(input.user_id)
        .bind(&input.title)
        .bind(&input.content)
        .bind(input.kind.as_str())
        .bind(&input.link)
        .bind(now)
        .execute(self.pool.sqlite())
        .await
        .context("Failed to create notification")?;

        Ok(Notification {
            id: result.last_insert_rowid(),
            user_id: input.user_id,
            title: input.title.clone(),
            content: input.content.clone(),
            kind: input.kind,
            read: false,
            link: input.link.clone(),
            created_at: now,
        })
    }

    async fn mark_read(&self, id: i64) -> Result<Option<Notification>> {
        sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to mark notification read")?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to delete notification")?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind: String = row.get("type");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        content: row.get("content"),
        kind: NotificationType::from_str(&kind)
            .with_context(|| format!("Invalid notification type in database: {}", kind))?,
        read: row.get("read"),
        link: row.get("link"),
        created_at: row.get("created_at"),
    })
}
