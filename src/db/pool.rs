//! Database connection pool
//!
//! SQLite only. The pool hides behind [`DatabasePool`] so handlers and
//! repositories share one `Arc` without caring how it was opened.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;

use crate::config::DatabaseConfig;

/// Database pool abstraction
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Execute a raw SQL statement that doesn't return rows
    async fn execute(&self, query: &str) -> Result<u64>;

    /// Round-trip a trivial query
    async fn ping(&self) -> Result<()>;

    /// Drain and close all connections
    async fn close(&self);

    /// The underlying SQLite pool
    fn sqlite(&self) -> &SqlitePool;
}

/// Pool backed by `sqlx::SqlitePool`
pub struct SqliteDatabase {
    pool: SqlitePool,
}

fn is_memory(url: &str) -> bool {
    url == ":memory:" || url.starts_with("sqlite::memory:")
}

/// Normalize a configured location into a sqlx connection string
fn connection_string(url: &str) -> String {
    match url {
        ":memory:" => "sqlite::memory:".to_string(),
        u if u.starts_with("sqlite:") && u.contains('?') => u.to_string(),
        u if u.starts_with("sqlite:") => format!("{u}?mode=rwc"),
        u => format!("sqlite:{u}?mode=rwc"),
    }
}

fn ensure_parent_dir(url: &str) -> Result<()> {
    let path = url.trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    match std::path::Path::new(path).parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create directory for database {}", dir.display())),
        _ => Ok(()),
    }
}

impl SqliteDatabase {
    /// Open (and create if needed) a SQLite database
    pub async fn new(url: &str) -> Result<Self> {
        if !is_memory(url) {
            ensure_parent_dir(url)?;
        }
        let connection_url = connection_string(url);

        // Every connection to `:memory:` is a separate database
        let options = if is_memory(url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = options
            .connect(&connection_url)
            .await
            .with_context(|| format!("Cannot open SQLite database at {url}"))?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .context("PRAGMA foreign_keys failed")?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        let done = sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Statement failed: {query}"))?;
        Ok(done.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("SQLite ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn sqlite(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Shared database pool
pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Open the configured database
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let db = SqliteDatabase::new(&config.url).await?;
    Ok(Arc::new(db))
}

/// In-memory database for tests
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    let config = DatabaseConfig {
        url: ":memory:".to_string(),
    };
    create_pool(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pool_keeps_one_database() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        for _ in 0..3 {
            let affected = pool
                .execute("INSERT INTO test (name) VALUES ('x')")
                .await
                .unwrap();
            assert_eq!(affected, 1);
        }
        pool.ping().await.unwrap();
    }

    #[test]
    fn test_connection_string() {
        assert_eq!(connection_string(":memory:"), "sqlite::memory:");
        assert_eq!(connection_string("data/r.db"), "sqlite:data/r.db?mode=rwc");
        assert_eq!(connection_string("sqlite:r.db"), "sqlite:r.db?mode=rwc");
        assert_eq!(connection_string("sqlite:r.db?mode=ro"), "sqlite:r.db?mode=ro");
    }

    #[tokio::test]
    async fn test_file_pool_creates_directories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("revista.db");

        let config = DatabaseConfig {
            url: db_path.to_string_lossy().to_string(),
        };
        let pool = create_pool(&config).await.unwrap();
        pool.ping().await.unwrap();
        assert!(db_path.exists());
        pool.close().await;
    }
}
