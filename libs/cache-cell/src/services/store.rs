use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::CacheError;

/// Backend for the schedule cache. Keys are grouped by provider so a write
/// can find and drop every entry it affects.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores `value` under `key` with a TTL and records the key in the provider's index.
    async fn put(&self, provider_id: Uuid, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// All keys currently indexed for the provider.
    async fn provider_keys(&self, provider_id: Uuid) -> Result<Vec<String>, CacheError>;

    async fn remove(&self, provider_id: Uuid, keys: &[String]) -> Result<(), CacheError>;

    async fn epoch(&self, provider_id: Uuid) -> Result<u64, CacheError>;

    /// Atomically increments and returns the provider's invalidation epoch.
    async fn advance_epoch(&self, provider_id: Uuid) -> Result<u64, CacheError>;
}
