//! Counter stores behind the rate limiter.
//!
//! `RedisCounterStore` is the networked backend. `InMemoryCounterStore` is a
//! process-local bounded map used when no Redis URL is configured.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::info;

#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Minimal counter contract consumed by the rate limiter.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current value; missing or expired keys read as 0.
    async fn get(&self, key: &str) -> Result<i64, CounterStoreError>;

    /// Increments and returns the new value, creating the key at 1.
    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError>;

    /// Sets or refreshes the key's time-to-live.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CounterStoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

const RECONNECT_EXPONENT_BASE: u64 = 2;
const RECONNECT_FACTOR_MS: u64 = 50;
const RECONNECT_RETRIES: usize = 2;
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Counters in Redis behind a [`ConnectionManager`], which reconnects in the
/// background after the server drops the link. Calls made while it is down
/// error out and the limiter fails open; later calls recover without a restart.
pub struct RedisCounterStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl RedisCounterStore {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            connection: OnceCell::new(),
        }
    }

    /// Connects on first use. A failed first connect is retried on the next call.
    async fn connection(&self) -> Result<ConnectionManager, CounterStoreError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                let conn = ConnectionManager::new_with_backoff_and_timeouts(
                    self.client.clone(),
                    RECONNECT_EXPONENT_BASE,
                    RECONNECT_FACTOR_MS,
                    RECONNECT_RETRIES,
                    RESPONSE_TIMEOUT,
                    CONNECT_TIMEOUT,
                )
                .await?;
                info!("Redis counter store connected");
                Ok::<_, CounterStoreError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &str) -> Result<i64, CounterStoreError> {
        let mut conn = self.connection().await?;
        let value: Option<i64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError> {
        let mut conn = self.connection().await?;
        Ok(conn.incr(key, 1_i64).await?)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CounterStoreError> {
        let mut conn = self.connection().await?;
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let _: bool = conn.expire(key, seconds).await?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Counter {
    value: i64,
    expires_at: Option<DateTime<Utc>>,
}

impl Counter {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Bounded process-local counters. When full, expired entries are purged first,
/// then the entry closest to expiry is evicted.
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
    capacity: usize,
}

impl InMemoryCounterStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Counter>> {
        // Counters are plain integers; a panic mid-update cannot leave them torn.
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn make_room(counters: &mut HashMap<String, Counter>, capacity: usize, now: DateTime<Utc>) {
        if counters.len() < capacity {
            return;
        }
        counters.retain(|_, c| !c.is_expired(now));
        if counters.len() < capacity {
            return;
        }
        let victim = counters
            .iter()
            .min_by_key(|(_, c)| c.expires_at.unwrap_or(DateTime::<Utc>::MAX_UTC))
            .map(|(k, _)| k.clone());
        if let Some(key) = victim {
            counters.remove(&key);
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self, key: &str) -> Result<i64, CounterStoreError> {
        let now = Utc::now();
        let mut counters = self.lock();
        match counters.get(key) {
            Some(c) if c.is_expired(now) => {
                counters.remove(key);
                Ok(0)
            }
            Some(c) => Ok(c.value),
            None => Ok(0),
        }
    }

    async fn incr(&self, key: &str) -> Result<i64, CounterStoreError> {
        let now = Utc::now();
        let mut counters = self.lock();

        if counters.get(key).is_some_and(|c| c.is_expired(now)) {
            counters.remove(key);
        }
        if !counters.contains_key(key) {
            Self::make_room(&mut counters, self.capacity, now);
        }

        let counter = counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: None,
        });
        counter.value += 1;
        Ok(counter.value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CounterStoreError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| CounterStoreError::Unavailable(format!("invalid ttl: {e}")))?;
        let mut counters = self.lock();
        if let Some(counter) = counters.get_mut(key) {
            counter.expires_at = Some(Utc::now() + ttl);
        }
        Ok(())
    }
}
