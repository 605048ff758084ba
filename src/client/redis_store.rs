//! Redis backed [`KeyValueStore`] for ESMEs that share a sequence counter.

use crate::client::store::{KeyValueStore, StoreError};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

/// Store backed by a Redis server through a reconnecting `ConnectionManager`.
///
/// Every key is prefixed with `prefix`, so several transports can share one
/// database without clashing.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        let prefix = prefix.into();
        debug!("Connected to redis at {} with key prefix {:?}", url, prefix);
        Ok(RedisStore { manager, prefix })
    }

    fn key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.incr(self.key(key), 1).await?)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.get(self.key(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let _: () = conn.set(self.key(key), value).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(self.key(key)).await?;
        Ok(removed > 0)
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.set_nx(self.key(key), value).await?)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.expire(self.key(key), seconds as i64).await?)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.ttl(self.key(key)).await?)
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.lpush(self.key(key), value).await?)
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.lrem(self.key(key), count, value).await?)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        let mut conn = self.manager.clone();
        Ok(conn.llen(self.key(key)).await?)
    }
}
