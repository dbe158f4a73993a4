//! Local cache store
//!
//! Durable per-device key/value storage for the client's mirrored data.
//! It supports:
//! - In-memory store (moka), for tests and throwaway sessions
//! - File store, one JSON document per key, for data that must survive a restart
//!
//! Values are serialized to JSON. The store holds no business logic; the
//! sync coordinator decides what to write and when.
//!
//! # Usage
//!
//! ```rust,ignore
//! use revista::cache::{create_store, KeyValueStore};
//! use revista::config::StoreConfig;
//!
//! let store = create_store(&StoreConfig::default())?;
//! store.set("articles", &articles).await?;
//! let restored: Option<Vec<Article>> = store.get("articles").await?;
//! ```

pub mod file;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;

use crate::config::{StoreConfig, StoreDriver};

/// Key/value store trait
///
/// Generic methods keep this trait from being object safe; use the
/// [`LocalStore`] enum for runtime polymorphism.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never written
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Overwrite the value stored under `key`
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()>;

    /// Remove a key. Missing keys are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key
    async fn clear(&self) -> Result<()>;
}

pub use file::FileStore;
pub use memory::MemoryStore;

/// Unified store enum for runtime polymorphism
#[derive(Debug)]
pub enum LocalStore {
    /// Process memory
    Memory(MemoryStore),
    /// JSON files on disk
    File(FileStore),
}

#[async_trait]
impl KeyValueStore for LocalStore {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            LocalStore::Memory(store) => store.get(key).await,
            LocalStore::File(store) => store.get(key).await,
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()> {
        match self {
            LocalStore::Memory(store) => store.set(key, value).await,
            LocalStore::File(store) => store.set(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            LocalStore::Memory(store) => store.delete(key).await,
            LocalStore::File(store) => store.delete(key).await,
        }
    }

    async fn clear(&self) -> Result<()> {
        match self {
            LocalStore::Memory(store) => store.clear().await,
            LocalStore::File(store) => store.clear().await,
        }
    }
}

/// Create a store instance based on configuration
///
/// - `StoreDriver::Memory` - moka-backed store bounded by `capacity`
/// - `StoreDriver::File` - file store rooted at `path` (created if missing)
pub fn create_store(config: &StoreConfig) -> Result<Arc<LocalStore>> {
    match config.driver {
        StoreDriver::Memory => Ok(Arc::new(LocalStore::Memory(MemoryStore::with_capacity(
            config.capacity,
        )))),
        StoreDriver::File => {
            let store = FileStore::open(&config.path)?;
            tracing::debug!("Local store opened at {}", config.path.display());
            Ok(Arc::new(LocalStore::File(store)))
        }
    }
}
