//! Database layer
//!
//! Backing store for the remote content service. SQLite only; the pool is
//! shared as a [`DynDatabasePool`] and wrapped by one repository per table.
//!
//! # Usage
//!
//! ```ignore
//! use revista::config::DatabaseConfig;
//! use revista::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, SqliteDatabase};
