//! Redis-backed shared state store.
//!
//! # Architecture
//!
//! - One `ConnectionManager` per process; every call clones it, so many
//!   tasks use the store concurrently with no in-process lock.
//! - Batches run as `MULTI`/`EXEC` pipelines (one round trip, atomic on
//!   the server relative to other clients).
//!
//! # Example
//!
//! ```no_run
//! use gatekeeper_auth::stores::RedisStore;
//! use gatekeeper_auth::providers::SharedStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisStore::new("redis://127.0.0.1:6379").await?;
//! store.ping().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::providers::{Batch, Command, Reply, SharedStore};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// `Redis` implementation of [`SharedStore`].
#[derive(Clone)]
pub struct RedisStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisStore {
    /// Create a new `Redis` store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns error if connection to `Redis` fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AuthError::Store(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            AuthError::Store(format!("Failed to create Redis connection manager: {e}"))
        })?;

        Ok(Self { conn_manager })
    }

    /// Expiry in milliseconds; `Redis` rejects zero.
    fn ttl_millis(ttl: Duration) -> u64 {
        u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
    }

    fn reply_from(value: redis::Value) -> Reply {
        match value {
            redis::Value::Int(n) => Reply::Int(n),
            redis::Value::Nil => Reply::Nil,
            redis::Value::BulkString(bytes) => Reply::Value(String::from_utf8_lossy(&bytes).into_owned()),
            _ => Reply::Ok,
        }
    }
}

impl SharedStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to ping Redis: {e}")))?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();

        conn.get(key)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to get key from Redis: {e}")))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .pset_ex(key, value, Self::ttl_millis(ttl))
            .await
            .map_err(|e| AuthError::Store(format!("Failed to set key in Redis: {e}")))?;

        Ok(())
    }

    async fn set_ex_if_exists(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        // SET .. XX only writes when the key is still present
        let written: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to conditionally set key: {e}")))?;

        Ok(written.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to delete key from Redis: {e}")))?;

        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        conn.exists(key)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to check key existence: {e}")))
    }

    async fn oldest(&self, key: &str) -> Result<Option<(String, f64)>> {
        let mut conn = self.conn_manager.clone();

        let entries: Vec<(String, f64)> = conn
            .zrange_withscores(key, 0, 0)
            .await
            .map_err(|e| AuthError::Store(format!("Failed to read oldest entry: {e}")))?;

        Ok(entries.into_iter().next())
    }

    async fn exec_atomic(&self, batch: Batch) -> Result<Vec<Reply>> {
        let mut conn = self.conn_manager.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();

        for command in batch.commands() {
            match command {
                Command::Set { key, value, ttl } => {
                    pipe.pset_ex(key, value, Self::ttl_millis(*ttl));
                }
                Command::Swap { key, value, ttl } => {
                    pipe.cmd("SET")
                        .arg(key)
                        .arg(value)
                        .arg("PX")
                        .arg(Self::ttl_millis(*ttl))
                        .arg("GET");
                }
                Command::Delete { key } => {
                    pipe.del(key);
                }
                Command::ZRemRangeByScore { key, min, max } => {
                    pipe.zrembyscore(key, *min, *max);
                }
                Command::ZCard { key } => {
                    pipe.zcard(key);
                }
                Command::ZAdd { key, score, member } => {
                    pipe.zadd(key, member, *score);
                }
                Command::PExpire { key, ttl } => {
                    let millis = i64::try_from(Self::ttl_millis(*ttl)).unwrap_or(i64::MAX);
                    pipe.pexpire(key, millis);
                }
            }
        }

        let values: Vec<redis::Value> = pipe.query_async(&mut conn).await.map_err(|e| {
            tracing::error!(
                error = %e,
                commands = batch.len(),
                "Redis atomic batch failed"
            );
            AuthError::Store(format!("Failed to execute atomic batch: {e}"))
        })?;

        Ok(values.into_iter().map(Self::reply_from).collect())
    }
}
