// ABOUTME: Key-value store abstraction behind the sequence allocator and the unacked window
// ABOUTME: Redis semantics for counters, locks with TTL and lists; in-memory and Redis backends

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key holds a value of another type (Redis WRONGTYPE)
    #[error("Key {key} does not hold {expected}")]
    WrongType { key: String, expected: &'static str },

    /// Backend failure (connection refused, protocol error, ...)
    #[error("Backend error: {0}")]
    Backend(String),

    #[cfg(feature = "redis-backend")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// The primitives the session needs from a shared key-value service.
///
/// Semantics follow Redis: `incr` on a missing key starts at 1, `ttl`
/// returns -2 for a missing key and -1 for a key without expiry, and the
/// list operations push at the head and remove by value.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Returns whether the key existed
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Set only when the key is missing; returns whether it was set
    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Returns false when the key does not exist
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError>;

    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Push onto the head of a list, returning the new length
    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Remove up to `count` occurrences of `value`: from the head when
    /// positive, from the tail when negative, all of them when zero
    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, StoreError>;

    async fn llen(&self, key: &str) -> Result<usize, StoreError>;
}

#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

/// Process-local store for a single ESME or for tests.
///
/// Expiry uses tokio's clock so paused-time tests can drive lock TTLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the map and drop every entry whose expiry has passed.
    fn live(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        entries
    }

    fn wrong_type(key: &str, expected: &'static str) -> StoreError {
        StoreError::WrongType {
            key: key.to_string(),
            expected,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        let mut entries = self.live();
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::Str("0".to_string()),
            expires_at: None,
        });
        let Value::Str(current) = &mut entry.value else {
            return Err(Self::wrong_type(key, "an integer"));
        };
        let next = current
            .parse::<i64>()
            .map_err(|_| Self::wrong_type(key, "an integer"))?
            + 1;
        *current = next.to_string();
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.live().get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(Self::wrong_type(key, "a string")),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.live().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.live().remove(key).is_some())
    }

    async fn setnx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        let mut entries = self.live();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: None,
            },
        );
        Ok(true)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool, StoreError> {
        match self.live().get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        Ok(match self.live().get(key) {
            None => -2,
            Some(Entry {
                expires_at: None, ..
            }) => -1,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => {
                // Rounded to the nearest second, as Redis does
                let remaining = at.saturating_duration_since(Instant::now()).as_millis();
                ((remaining + 500) / 1000) as i64
            }
        })
    }

    async fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut entries = self.live();
        let entry = entries.entry(key.to_string()).or_insert(Entry {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        let Value::List(list) = &mut entry.value else {
            return Err(Self::wrong_type(key, "a list"));
        };
        list.push_front(value.to_string());
        Ok(list.len())
    }

    async fn lrem(&self, key: &str, count: isize, value: &str) -> Result<usize, StoreError> {
        let mut entries = self.live();
        let Some(entry) = entries.get_mut(key) else {
            return Ok(0);
        };
        let Value::List(list) = &mut entry.value else {
            return Err(Self::wrong_type(key, "a list"));
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs()
        };
        let mut positions: Vec<usize> = if count >= 0 {
            (0..list.len())
                .filter(|&i| list[i] == value)
                .take(limit)
                .collect()
        } else {
            (0..list.len())
                .rev()
                .filter(|&i| list[i] == value)
                .take(limit)
                .collect()
        };

        positions.sort_unstable_by(|a, b| b.cmp(a));
        for i in &positions {
            list.remove(*i);
        }
        let removed = positions.len();
        if list.is_empty() {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn llen(&self, key: &str) -> Result<usize, StoreError> {
        match self.live().get(key) {
            None => Ok(0),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.len()),
            Some(_) => Err(Self::wrong_type(key, "a list")),
        }
    }
}
