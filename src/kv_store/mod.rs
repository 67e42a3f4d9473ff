//! Durable key-value storage for per-network snapshots.
//!
//! Values are opaque bytes addressed by `(logical key, chain id)`. A missing
//! entry is reported as [`KvError::NotFound`], which callers treat as the
//! normal cold-start case.

pub mod file;
#[cfg(feature = "redis")]
pub mod redis;

use crate::settings::{StorageBackend, StorageSettings};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub use file::FileKvStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisKvStore;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Backend error: {0}")]
    Backend(String),
}

impl KvError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KvError::NotFound(_))
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Stores `value`, replacing whatever was saved under the same key and chain.
    async fn save(&self, key: &str, chain_id: u64, value: Vec<u8>) -> Result<(), KvError>;

    async fn load(&self, key: &str, chain_id: u64) -> Result<Vec<u8>, KvError>;
}

/// Physical key used by every backend: `"{key}:{chain_id}"`.
pub fn storage_key(key: &str, chain_id: u64) -> String {
    format!("{}:{}", key, chain_id)
}

pub async fn save_value<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    chain_id: u64,
    value: &T,
) -> Result<(), KvError> {
    let bytes = bincode::serialize(value)?;
    store.save(key, chain_id, bytes).await
}

pub async fn load_value<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
    chain_id: u64,
) -> Result<T, KvError> {
    let bytes = store.load(key, chain_id).await?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Process-local store. Nothing survives a restart; used in tests and when
/// persistence is disabled.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn save(&self, key: &str, chain_id: u64, value: Vec<u8>) -> Result<(), KvError> {
        self.entries.insert(storage_key(key, chain_id), value);
        Ok(())
    }

    async fn load(&self, key: &str, chain_id: u64) -> Result<Vec<u8>, KvError> {
        let full_key = storage_key(key, chain_id);
        self.entries
            .get(&full_key)
            .map(|entry| entry.value().clone())
            .ok_or(KvError::NotFound(full_key))
    }
}

/// Opens the backend selected in `[storage]`.
pub async fn open_backend(settings: &StorageSettings) -> Result<Arc<dyn KeyValueStore>> {
    match settings.backend {
        StorageBackend::Memory => {
            info!("Snapshot storage: in-memory (not persisted across restarts)");
            Ok(Arc::new(MemoryKvStore::new()))
        }
        StorageBackend::File => {
            let store = FileKvStore::open(&settings.path).await?;
            info!("Snapshot storage: files under {}", settings.path);
            Ok(Arc::new(store))
        }
        #[cfg(feature = "redis")]
        StorageBackend::Redis => {
            let store = RedisKvStore::connect(&settings.redis_url).await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "redis"))]
        StorageBackend::Redis => Err(anyhow::anyhow!(
            "Redis storage requested but the 'redis' feature is not enabled"
        )),
    }
}
