//! User repository
//!
//! Database operations for user accounts.
//!
//! Passwords are stored and compared as plain text. This mirrors the
//! deployed service and is a known defect, not a design choice.

use crate::db::DynDatabasePool;
use crate::models::{NewUser, TalentCategory, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// All users, oldest account first
    async fn list(&self) -> Result<Vec<User>>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Active user matching all three credentials
    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Option<User>>;

    /// Check if a username is taken
    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    /// Create a new user
    async fn create(&self, input: &NewUser) -> Result<User>;

    /// Enable or disable login, returning the updated user
    async fn set_active(&self, id: i64, active: bool) -> Result<Option<User>>;

    /// Replace the password, returning the updated user
    async fn set_password(&self, id: i64, password: &str) -> Result<Option<User>>;

    /// Record a successful login
    async fn touch_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

/// SQLx-based user repository implementation
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn list(&self) -> Result<Vec<User>> {
        list_users_sqlite(self.pool.sqlite()).await
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        get_user_by_id_sqlite(self.pool.sqlite(), id).await
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Option<User>> {
        find_by_credentials_sqlite(self.pool.sqlite(), username, password, role).await
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(self.pool.sqlite())
            .await
            .context("Failed to check username")?;
        Ok(count > 0)
    }

    async fn create(&self, input: &NewUser) -> Result<User> {
        create_user_sqlite(self.pool.sqlite(), input).await
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<Option<User>> {
        let result = sqlx::query("UPDATE users SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to update user status")?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn set_password(&self, id: i64, password: &str) -> Result<Option<User>> {
        let result = sqlx::query("UPDATE users SET password = ? WHERE id = ?")
            .bind(password)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to reset password")?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn touch_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(self.pool.sqlite())
            .await
            .context("Failed to record login")?;
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

const USER_COLUMNS: &str = "id, username, password, name, role, talent, active, last_login";

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
        .fetch_all(pool)
        .await
        .context("Failed to list users")?;
    rows.iter().map(row_to_user_sqlite).collect()
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn find_by_credentials_sqlite(
    pool: &SqlitePool,
    username: &str,
    password: &str,
    role: UserRole,
) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = ? AND password = ? AND role = ? AND active = 1",
        USER_COLUMNS
    ))
    .bind(username)
    .bind(password)
    .bind(role.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to look up credentials")?;

    match row {
        Some(row) => Ok(Some(row_to_user_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn create_user_sqlite(pool: &SqlitePool, input: &NewUser) -> Result<User> {
    let talent = input.effective_talent();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, password, name, role, talent, active)
        VALUES (?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(input.username.trim())
    .bind(&input.password)
    .bind(input.name.trim())
    .bind(input.role.as_str())
    .bind(talent.map(|t| t.as_str()))
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        username: input.username.trim().to_string(),
        password: Some(input.password.clone()),
        name: input.name.trim().to_string(),
        role: input.role,
        talent,
        active: true,
        last_login: None,
    })
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role_str: String = row.get("role");
    let role = UserRole::from_str(&role_str)
        .with_context(|| format!("Invalid role in database: {}", role_str))?;

    let talent: Option<String> = row.get("talent");
    let talent = talent.and_then(|s| TalentCategory::from_str(&s).ok());

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        password: Some(row.get("password")),
        name: row.get("name"),
        role,
        talent,
        active: row.get("active"),
        last_login: row.get("last_login"),
    })
}
