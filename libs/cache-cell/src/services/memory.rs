use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::CacheError;
use crate::services::store::CacheStore;

struct CacheEntry {
    value: String,
    inserted_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct MemoryState {
    entries: HashMap<String, CacheEntry>,
    index: HashMap<Uuid, HashSet<String>>,
    epochs: HashMap<Uuid, u64>,
}

/// Process-local cache store. All state sits behind one lock, so each
/// operation is linearizable.
pub struct MemoryCacheStore {
    state: RwLock<MemoryState>,
    max_entries: usize,
}

impl MemoryCacheStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            max_entries: max_entries.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    fn evict_if_needed(state: &mut MemoryState, max_entries: usize, now: Instant) {
        if state.entries.len() < max_entries {
            return;
        }

        state.entries.retain(|_, entry| !entry.is_expired(now));

        if state.entries.len() >= max_entries {
            // Oldest tenth goes first.
            let mut by_age: Vec<(String, Instant)> = state
                .entries
                .iter()
                .map(|(key, entry)| (key.clone(), entry.inserted_at))
                .collect();
            by_age.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

            let to_remove = (max_entries / 10).max(1);
            for (key, _) in by_age.into_iter().take(to_remove) {
                state.entries.remove(&key);
            }
            info!("Memory cache evicted {} entries", to_remove);
        }

        let MemoryState { entries, index, .. } = state;
        for keys in index.values_mut() {
            keys.retain(|key| entries.contains_key(key));
        }
        index.retain(|_, keys| !keys.is_empty());
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let state = self.state.read().await;

        match state.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                debug!("Memory cache entry expired: {}", key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, provider_id: Uuid, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut state = self.state.write().await;

        Self::evict_if_needed(&mut state, self.max_entries, now);

        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
        state.index.entry(provider_id).or_default().insert(key.to_string());

        Ok(())
    }

    async fn provider_keys(&self, provider_id: Uuid) -> Result<Vec<String>, CacheError> {
        let state = self.state.read().await;
        let mut keys: Vec<String> = state
            .index
            .get(&provider_id)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    async fn remove(&self, provider_id: Uuid, keys: &[String]) -> Result<(), CacheError> {
        let mut state = self.state.write().await;

        for key in keys {
            state.entries.remove(key);
        }

        if let Some(indexed) = state.index.get_mut(&provider_id) {
            for key in keys {
                indexed.remove(key);
            }
            if indexed.is_empty() {
                state.index.remove(&provider_id);
            }
        }

        Ok(())
    }

    async fn epoch(&self, provider_id: Uuid) -> Result<u64, CacheError> {
        Ok(self.state.read().await.epochs.get(&provider_id).copied().unwrap_or(0))
    }

    async fn advance_epoch(&self, provider_id: Uuid) -> Result<u64, CacheError> {
        let mut state = self.state.write().await;
        let epoch = state.epochs.entry(provider_id).or_insert(0);
        *epoch += 1;
        Ok(*epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryCacheStore::new(16);
        let provider = Uuid::new_v4();

        store.put(provider, "k", "v".to_string(), Duration::from_secs(30)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn evicts_oldest_when_full() {
        let store = MemoryCacheStore::new(3);
        let provider = Uuid::new_v4();

        for key in ["a", "b", "c"] {
            store.put(provider, key, key.to_string(), Duration::from_secs(60)).await.unwrap();
            tokio::time::advance(Duration::from_millis(10)).await;
        }
        store.put(provider, "d", "d".to_string(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.len().await, 3);
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.provider_keys(provider).await.unwrap(), vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn epochs_are_per_provider() {
        let store = MemoryCacheStore::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        assert_eq!(store.advance_epoch(a).await.unwrap(), 1);
        assert_eq!(store.advance_epoch(a).await.unwrap(), 2);
        assert_eq!(store.epoch(a).await.unwrap(), 2);
        assert_eq!(store.epoch(b).await.unwrap(), 0);
    }
}
