//! Database migrations
//!
//! Schema changes embedded as SQL strings and applied in version order.
//! Applied versions are recorded in `_migrations`.
//!
//! The CHECK constraints repeat the article rules so a bad write fails in the
//! database even if a handler forgets a guard.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use super::DynDatabasePool;

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements
    pub up: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_schema",
        up: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                password VARCHAR(255) NOT NULL,
                name VARCHAR(100) NOT NULL,
                role VARCHAR(20) NOT NULL CHECK (role IN ('student', 'teacher', 'admin', 'parent')),
                talent VARCHAR(20),
                active INTEGER NOT NULL DEFAULT 1,
                last_login TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(100) NOT NULL,
                category VARCHAR(20) NOT NULL,
                chapter VARCHAR(20) NOT NULL CHECK (chapter IN ('portfolios', 'experiences', 'positioning')),
                content TEXT NOT NULL,
                author_id INTEGER NOT NULL,
                image_url TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft'
                    CHECK (status IN ('draft', 'pending', 'published', 'rejected')),
                rejection_reason TEXT,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                published_at TIMESTAMP,
                CHECK ((status = 'published') = (published_at IS NOT NULL)),
                CHECK ((status = 'rejected') = (rejection_reason IS NOT NULL)),
                FOREIGN KEY (author_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);
            CREATE INDEX IF NOT EXISTS idx_articles_author_id ON articles(author_id);
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                article_id INTEGER NOT NULL,
                author_id INTEGER NOT NULL,
                content TEXT NOT NULL CHECK (length(trim(content)) > 0),
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (article_id) REFERENCES articles(id),
                FOREIGN KEY (author_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_comments_article_id ON comments(article_id);
            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title VARCHAR(200) NOT NULL,
                content TEXT NOT NULL,
                type VARCHAR(20) NOT NULL DEFAULT 'info'
                    CHECK (type IN ('info', 'success', 'warning', 'danger')),
                read INTEGER NOT NULL DEFAULT 0,
                link VARCHAR(100),
                created_at TIMESTAMP NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user_id ON notifications(user_id);
        "#,
    },
    Migration {
        version: 2,
        name: "seed_users",
        up: r#"
            INSERT OR IGNORE INTO users (username, password, name, role, talent) VALUES
                ('admin', 'admin', 'Administrator', 'admin', NULL),
                ('docente1', '123', 'Teacher One', 'teacher', NULL),
                ('estudiante1', '123', 'Student One', 'student', 'artistic'),
                ('estudiante2', '123', 'Student Two', 'student', 'musical'),
                ('padre1', '123', 'Parent One', 'parent', NULL);
        "#,
    },
];

/// Run all pending migrations, returning how many were applied
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool.sqlite()).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;
    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!("Applying migration {}: {}", migration.version, migration.name);
            apply_migration(pool.sqlite(), migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }
    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name VARCHAR(255) NOT NULL UNIQUE,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;
    Ok(())
}

async fn get_applied_migrations(pool: &SqlitePool) -> Result<Vec<MigrationRecord>> {
    let rows = sqlx::query("SELECT version, name, applied_at FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| MigrationRecord {
            version: row.get("version"),
            name: row.get("name"),
            applied_at: row.get("applied_at"),
        })
        .collect())
}

/// Apply one migration and record it, all in one transaction
async fn apply_migration(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((end, _)) => format!("{}...", &sql[..end]),
        None => sql.to_string(),
    }
}

/// Split SQL into statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_comment_only(s))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool.sqlite()).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    async fn migrated() -> DynDatabasePool {
        let pool = create_test_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_run_migrations_once() {
        let pool = create_test_pool().await.unwrap();
        assert_eq!(pending_count(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&pool).await.unwrap(), 0);
        assert_eq!(pending_count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_seed_users() {
        let pool = migrated().await;
        let rows = sqlx::query("SELECT username, role FROM users ORDER BY id")
            .fetch_all(pool.sqlite())
            .await
            .unwrap();
        let users: Vec<(String, String)> = rows
            .iter()
            .map(|r| (r.get("username"), r.get("role")))
            .collect();
        assert_eq!(users.len(), 5);
        assert_eq!(users[0], ("admin".to_string(), "admin".to_string()));
        assert_eq!(users[4], ("padre1".to_string(), "parent".to_string()));
    }

    #[tokio::test]
    async fn test_article_status_constraints() {
        let pool = migrated().await;
        let now = Utc::now();
        let insert = |status: &'static str, published: Option<DateTime<Utc>>, reason: Option<&'static str>| {
            sqlx::query(
                "INSERT INTO articles (title, category, chapter, content, author_id, status, \
                 rejection_reason, created_at, updated_at, published_at) \
                 VALUES ('Title', 'artistic', 'portfolios', 'content', 3, ?, ?, ?, ?, ?)",
            )
            .bind(status)
            .bind(reason)
            .bind(now)
            .bind(now)
            .bind(published)
        };

        assert!(insert("published", Some(now), None).execute(pool.sqlite()).await.is_ok());
        assert!(insert("rejected", None, Some("why")).execute(pool.sqlite()).await.is_ok());
        assert!(insert("published", None, None).execute(pool.sqlite()).await.is_err());
        assert!(insert("draft", Some(now), None).execute(pool.sqlite()).await.is_err());
        assert!(insert("rejected", None, None).execute(pool.sqlite()).await.is_err());
        assert!(insert("pending", None, Some("stale")).execute(pool.sqlite()).await.is_err());
        assert!(insert("archived", None, None).execute(pool.sqlite()).await.is_err());
    }

    #[tokio::test]
    async fn test_blank_comment_and_dangling_refs_rejected() {
        let pool = migrated().await;
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO articles (title, category, chapter, content, author_id, status, created_at, updated_at) \
             VALUES ('Title', 'artistic', 'portfolios', 'content', 3, 'draft', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(pool.sqlite())
        .await
        .unwrap();

        let comment = |article_id: i64, content: &'static str| {
            sqlx::query("INSERT INTO comments (article_id, author_id, content, created_at) VALUES (?, 1, ?, ?)")
                .bind(article_id)
                .bind(content)
                .bind(now)
        };
        assert!(comment(1, "fine").execute(pool.sqlite()).await.is_ok());
        assert!(comment(1, "   ").execute(pool.sqlite()).await.is_err());
        assert!(comment(99, "orphan").execute(pool.sqlite()).await.is_err());

        let orphan = sqlx::query("INSERT INTO notifications (user_id, title, content, created_at) VALUES (99, 't', 'c', ?)")
            .bind(now)
            .execute(pool.sqlite())
            .await;
        assert!(orphan.is_err());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT);\n-- comment only\n;\nINSERT INTO a VALUES (1)";
        assert_eq!(
            split_sql_statements(sql),
            vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)"]
        );
    }
}
