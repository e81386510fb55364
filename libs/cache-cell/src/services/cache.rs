use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::{AppConfig, CacheBackend};
use shared_utils::within;

use crate::models::{CacheError, CacheKey, CacheStats, CachedEnvelope, InvalidationScope};
use crate::services::memory::MemoryCacheStore;
use crate::services::redis::RedisCacheStore;
use crate::services::store::CacheStore;

#[derive(Default)]
struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_rejections: AtomicU64,
    invalidations: AtomicU64,
}

impl CacheMetrics {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_stale(&self) {
        self.stale_rejections.fetch_add(1, Ordering::Relaxed);
    }

    fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }
}

/// Read-through cache for derived schedule data.
///
/// Every entry is stamped with the provider's invalidation epoch as it was
/// read *before* the underlying computation started. A read only accepts an
/// entry whose stamp equals the current epoch, and every committed write
/// advances the epoch before deleting keys. A computation that raced with a
/// write therefore lands with an old stamp and is never served.
pub struct ScheduleCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    timeout: Duration,
    metrics: CacheMetrics,
}

impl ScheduleCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            timeout,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn in_memory(config: &AppConfig) -> Self {
        let store = Arc::new(MemoryCacheStore::new(config.cache_max_entries));
        Self::new(store, config.cache_ttl(), config.store_timeout())
    }

    /// Builds the cache on the backend named in the config.
    pub async fn from_config(config: &AppConfig) -> Result<Self, CacheError> {
        match config.cache_backend {
            CacheBackend::Memory => {
                info!("Using in-process schedule cache (max {} entries)", config.cache_max_entries);
                Ok(Self::in_memory(config))
            }
            CacheBackend::Redis => {
                let store = RedisCacheStore::new(config).await?;
                info!("Using Redis schedule cache");
                Ok(Self::new(Arc::new(store), config.cache_ttl(), config.store_timeout()))
            }
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Returns the cached value for `key`, or runs `load` and caches its result.
    #[instrument(skip(self, load), fields(key = %key.render()))]
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &CacheKey, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let provider_id = key.provider_id();
        let rendered = key.render();

        let epoch = self.guarded("cache epoch read", self.store.epoch(provider_id)).await?;

        if let Some(raw) = self.guarded("cache read", self.store.get(&rendered)).await? {
            match serde_json::from_str::<CachedEnvelope>(&raw) {
                Ok(envelope) if envelope.epoch == epoch => match serde_json::from_value::<T>(envelope.payload) {
                    Ok(value) => {
                        self.metrics.record_hit();
                        debug!("Cache hit for {}", rendered);
                        return Ok(value);
                    }
                    Err(e) => warn!("Discarding undecodable cache entry {}: {}", rendered, e),
                },
                Ok(envelope) => {
                    self.metrics.record_stale();
                    debug!(
                        "Rejecting stale cache entry {} (epoch {} != {})",
                        rendered, envelope.epoch, epoch
                    );
                }
                Err(e) => warn!("Discarding malformed cache entry {}: {}", rendered, e),
            }
        }

        self.metrics.record_miss();
        let value = load().await?;

        let envelope = CachedEnvelope {
            epoch,
            payload: serde_json::to_value(&value).map_err(CacheError::from)?,
        };
        let encoded = serde_json::to_string(&envelope).map_err(CacheError::from)?;
        self.guarded(
            "cache write",
            self.store.put(provider_id, &rendered, encoded, self.ttl),
        )
        .await?;

        Ok(value)
    }

    /// Makes every entry of `provider_id` that `scope` touches unservable.
    /// Call after the write has committed.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, provider_id: Uuid, scope: InvalidationScope) -> Result<usize, CacheError> {
        let epoch = self
            .guarded("cache epoch advance", self.store.advance_epoch(provider_id))
            .await?;
        self.metrics.record_invalidation();

        let keys: Vec<String> = self
            .guarded("cache index read", self.store.provider_keys(provider_id))
            .await?
            .into_iter()
            .filter(|raw| match (&scope, CacheKey::parse(raw)) {
                (InvalidationScope::AllDates, _) => true,
                (InvalidationScope::Dates(dates), Some(key)) => key.touches(provider_id, dates),
                // Unparseable keys cannot be proven unaffected.
                (InvalidationScope::Dates(_), None) => true,
            })
            .collect();

        if !keys.is_empty() {
            self.guarded("cache delete", self.store.remove(provider_id, &keys))
                .await?;
        }

        debug!(
            "Invalidated {} cache entries for provider {} (epoch now {})",
            keys.len(),
            provider_id,
            epoch
        );
        Ok(keys.len())
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.metrics.hits.load(Ordering::Relaxed);
        let misses = self.metrics.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            backend: self.backend_name().to_string(),
            hits,
            misses,
            stale_rejections: self.metrics.stale_rejections.load(Ordering::Relaxed),
            invalidations: self.metrics.invalidations.load(Ordering::Relaxed),
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
        }
    }

    async fn guarded<T, Fut>(&self, operation: &'static str, fut: Fut) -> Result<T, CacheError>
    where
        Fut: Future<Output = Result<T, CacheError>>,
    {
        within(self.timeout, operation, fut)
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))?
    }
}
