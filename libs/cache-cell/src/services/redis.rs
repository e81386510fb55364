use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Connection, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::CacheError;
use crate::services::store::CacheStore;

/// Index sets outlive their entries a little so a late `put` never leaves an
/// unindexed key behind.
const INDEX_TTL_PADDING_SECS: u64 = 60;

/// Shared cache store for horizontally scaled instances.
pub struct RedisCacheStore {
    pool: Pool,
}

impl RedisCacheStore {
    pub async fn new(config: &AppConfig) -> Result<Self, CacheError> {
        let redis_url = config
            .redis_url
            .clone()
            .ok_or_else(|| CacheError::Unavailable("REDIS_URL is not configured".to_string()))?;

        let cfg = Config::from_url(redis_url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Unavailable(format!("Failed to create Redis pool: {}", e)))?;

        let store = Self { pool };

        let mut conn = store.get_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis cache store initialized successfully");

        Ok(store)
    }

    async fn get_connection(&self) -> Result<Connection, CacheError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis connection error: {}", e)))
    }

    fn index_key(provider_id: Uuid) -> String {
        format!("sched:index:{}", provider_id)
    }

    fn epoch_key(provider_id: Uuid) -> String {
        format!("sched:epoch:{}", provider_id)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, provider_id: Uuid, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;
        let ttl_secs = ttl.as_secs().max(1);
        let index_key = Self::index_key(provider_id);

        let _: () = redis::pipe()
            .atomic()
            .set_ex(key, value, ttl_secs)
            .ignore()
            .sadd(&index_key, key)
            .ignore()
            .expire(&index_key, (ttl_secs + INDEX_TTL_PADDING_SECS) as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;

        debug!("Redis cache set: key={}, ttl={}s", key, ttl_secs);
        Ok(())
    }

    async fn provider_keys(&self, provider_id: Uuid) -> Result<Vec<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let mut keys: Vec<String> = conn.smembers(Self::index_key(provider_id)).await?;
        keys.sort();
        Ok(keys)
    }

    async fn remove(&self, provider_id: Uuid, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(keys)
            .ignore()
            .srem(Self::index_key(provider_id), keys)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn epoch(&self, provider_id: Uuid) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;
        let epoch: Option<u64> = conn.get(Self::epoch_key(provider_id)).await?;
        Ok(epoch.unwrap_or(0))
    }

    async fn advance_epoch(&self, provider_id: Uuid) -> Result<u64, CacheError> {
        let mut conn = self.get_connection().await?;
        let epoch: u64 = conn.incr(Self::epoch_key(provider_id), 1u64).await?;
        Ok(epoch)
    }
}
