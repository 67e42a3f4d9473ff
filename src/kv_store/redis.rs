// Redis-backed snapshot storage (requires the `redis` feature)

use super::{storage_key, KeyValueStore, KvError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

/// Stores values under `"{key}:{chain_id}"` without expiry.
#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;
        info!("✅ Snapshot storage connected to {}", url);
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn save(&self, key: &str, chain_id: u64, value: Vec<u8>) -> Result<(), KvError> {
        let full_key = storage_key(key, chain_id);
        // ConnectionManager is a cheap handle onto the shared multiplexed connection
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&full_key, value)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        debug!("💾 Stored {}", full_key);
        Ok(())
    }

    async fn load(&self, key: &str, chain_id: u64) -> Result<Vec<u8>, KvError> {
        let full_key = storage_key(key, chain_id);
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn
            .get(&full_key)
            .await
            .map_err(|e| KvError::Backend(e.to_string()))?;
        bytes.ok_or(KvError::NotFound(full_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // needs a local Redis at redis://127.0.0.1:6379
    async fn round_trip_against_local_redis() {
        let store = RedisKvStore::connect("redis://127.0.0.1:6379").await.unwrap();
        store.save("StrategySdkTest", 1, vec![7, 8]).await.unwrap();
        assert_eq!(store.load("StrategySdkTest", 1).await.unwrap(), vec![7, 8]);
        assert!(store.load("StrategySdkTest", 999).await.unwrap_err().is_not_found());
    }
}
