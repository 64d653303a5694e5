//! Redis implementation of the grant store's key-value capability.
//!
//! ## Command Mapping
//!
//! | Operation | Redis |
//! |-----------|-------|
//! | `get` | `GET` |
//! | `get_many` | `MGET` |
//! | `members` | `SMEMBERS` |
//! | `remove_members` | `SREM` |
//! | `execute` | `MULTI` … `EXEC` with `PSETEX`, `DEL`, `SADD`, `SREM`, `PEXPIRE` |
//! | `ping` | `PING` |
//!
//! Batches run as a MULTI/EXEC transaction, so no other client observes a
//! half-applied batch. Redis does not roll back a transaction when a single
//! command fails at runtime (e.g. `WRONGTYPE`); such a failure is reported as
//! an error, but the other commands of the batch stay applied. The grant
//! store's key layout never mixes value kinds under one key.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool, PoolError};
use octofhir_grants::{BatchOp, InMemoryKvStore, KeyValueStore, KvError, KvResult, WriteBatch};
use redis::{AsyncCommands, RedisError};

use crate::config::RedisConfig;

/// Grant backend on a pooled Redis connection.
#[derive(Clone)]
pub struct RedisKvStore {
    pool: Pool,
}

impl RedisKvStore {
    /// Wraps an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Creates a pool from configuration and verifies the server is
    /// reachable.
    pub async fn connect(config: &RedisConfig) -> KvResult<Self> {
        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        let timeout = Duration::from_millis(config.timeout_ms);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| KvError::connection(e.to_string()))?;

        let store = Self::new(pool);
        store.ping().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn connection(&self) -> KvResult<Connection> {
        self.pool.get().await.map_err(map_pool_error)
    }
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn get_many(&self, keys: &[String]) -> KvResult<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection().await?;
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(e, "MGET"))?;
        Ok(values)
    }

    async fn members(&self, key: &str) -> KvResult<Vec<String>> {
        let mut conn = self.connection().await?;
        conn.smembers::<_, Vec<String>>(key)
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> KvResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        conn.srem::<_, _, ()>(key, members)
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let pipe = build_pipeline(batch);
        let mut conn = self.connection().await?;
        let replies: Vec<redis::Value> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(e, "EXEC"))?;
        check_replies(replies)
    }

    async fn ping(&self) -> KvResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(e, "PING"))?;
        Ok(())
    }
}

/// Translates a batch into a MULTI/EXEC pipeline.
fn build_pipeline(batch: WriteBatch) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for op in batch.into_ops() {
        match op {
            BatchOp::Set { key, value, ttl } => {
                pipe.cmd("PSETEX")
                    .arg(key)
                    .arg(ttl_millis(ttl))
                    .arg(value);
            }
            BatchOp::Delete { keys } => {
                pipe.del(keys);
            }
            BatchOp::AddMember { key, member } => {
                pipe.sadd(key, member);
            }
            BatchOp::RemoveMembers { key, members } => {
                pipe.srem(key, members);
            }
            BatchOp::Expire { key, ttl } => {
                pipe.cmd("PEXPIRE").arg(key).arg(ttl_millis(ttl));
            }
        }
    }
    pipe
}

/// Redis executes the rest of a transaction when one command fails, so the
/// per-command replies of EXEC are checked for server errors.
fn check_replies(replies: Vec<redis::Value>) -> KvResult<()> {
    for reply in replies {
        if let redis::Value::ServerError(err) = reply {
            return Err(if err.code() == "WRONGTYPE" {
                KvError::wrong_type("EXEC")
            } else {
                KvError::command(format!("{}: {}", err.code(), err.details().unwrap_or_default()))
            });
        }
    }
    Ok(())
}

/// Redis rejects non-positive expiries, so sub-millisecond TTLs round up.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(i64::MAX as u64)
        .clamp(1, i64::MAX as u64)
}

fn map_pool_error(e: PoolError) -> KvError {
    match e {
        PoolError::Timeout(_) => KvError::timeout(e.to_string()),
        _ => KvError::connection(e.to_string()),
    }
}

fn map_redis_error(e: RedisError, context: &str) -> KvError {
    if e.code() == Some("WRONGTYPE") {
        KvError::wrong_type(context)
    } else if e.is_timeout() {
        KvError::timeout(e.to_string())
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        KvError::connection(e.to_string())
    } else {
        KvError::command(e.to_string())
    }
}

// =============================================================================
// Backend selection
// =============================================================================

/// Grant backend chosen at startup.
///
/// - **Memory**: single-instance mode, grants live in process memory
/// - **Redis**: multi-instance mode, grants shared through Redis
#[derive(Clone)]
pub enum GrantBackend {
    Memory(InMemoryKvStore),
    Redis(RedisKvStore),
}

impl GrantBackend {
    /// Returns the backend mode label ("memory" or "redis").
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

#[async_trait]
impl KeyValueStore for GrantBackend {
    async fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn get_many(&self, keys: &[String]) -> KvResult<Vec<Option<Vec<u8>>>> {
        match self {
            Self::Memory(store) => store.get_many(keys).await,
            Self::Redis(store) => store.get_many(keys).await,
        }
    }

    async fn members(&self, key: &str) -> KvResult<Vec<String>> {
        match self {
            Self::Memory(store) => store.members(key).await,
            Self::Redis(store) => store.members(key).await,
        }
    }

    async fn remove_members(&self, key: &str, members: &[String]) -> KvResult<()> {
        match self {
            Self::Memory(store) => store.remove_members(key, members).await,
            Self::Redis(store) => store.remove_members(key, members).await,
        }
    }

    async fn execute(&self, batch: WriteBatch) -> KvResult<()> {
        match self {
            Self::Memory(store) => store.execute(batch).await,
            Self::Redis(store) => store.execute(batch).await,
        }
    }

    async fn ping(&self) -> KvResult<()> {
        match self {
            Self::Memory(store) => store.ping().await,
            Self::Redis(store) => store.ping().await,
        }
    }
}

/// Create the grant backend based on configuration.
///
/// Falls back to in-memory storage when Redis is disabled or cannot be
/// reached at startup.
pub async fn create_grant_backend(config: &RedisConfig) -> GrantBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, keeping grants in memory");
        return GrantBackend::Memory(InMemoryKvStore::new());
    }

    tracing::info!(url = %config.url, "Connecting grant store to Redis");

    match RedisKvStore::connect(config).await {
        Ok(store) => {
            tracing::info!("Grant store connected to Redis");
            GrantBackend::Redis(store)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to in-memory grant storage."
            );
            GrantBackend::Memory(InMemoryKvStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(3600)), 3_600_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::MAX), i64::MAX as u64);
    }

    #[test]
    fn test_pipeline_is_atomic_and_ordered() {
        let mut batch = WriteBatch::new();
        batch
            .set("k1", b"v".to_vec(), Duration::from_secs(60))
            .add_member("idx:u1", "k1")
            .expire("idx:u1:c1:refresh_token", Duration::from_secs(60))
            .remove_members("idx:u1:c1", vec!["k0".to_string()])
            .delete(vec!["k0".to_string()]);

        let packed = String::from_utf8_lossy(&build_pipeline(batch).get_packed_pipeline())
            .into_owned();
        let positions: Vec<usize> = ["MULTI", "PSETEX", "SADD", "PEXPIRE", "SREM", "DEL", "EXEC"]
            .iter()
            .map(|cmd| packed.find(cmd).unwrap_or_else(|| panic!("{cmd} missing")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_check_replies() {
        assert!(check_replies(vec![redis::Value::Okay, redis::Value::Int(1)]).is_ok());
        assert!(check_replies(Vec::new()).is_ok());
    }

    #[tokio::test]
    async fn test_disabled_config_uses_memory() {
        let backend = create_grant_backend(&RedisConfig::default()).await;
        assert_eq!(backend.mode(), "memory");
        assert!(backend.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_redis_falls_back_to_memory() {
        let config = RedisConfig {
            enabled: true,
            url: "redis://127.0.0.1:1".to_string(),
            pool_size: 1,
            timeout_ms: 200,
        };
        let backend = create_grant_backend(&config).await;
        assert_eq!(backend.mode(), "memory");
    }
}
