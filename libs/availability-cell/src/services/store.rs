use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::{StoreError, SupabaseClient};

use crate::models::AvailabilityWindow;

const WINDOWS_TABLE: &str = "/rest/v1/availability_windows";

/// Durable storage for availability windows.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn insert(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError>;

    /// Stores `window` in place of the value whose revision is `window.revision - 1`.
    /// Fails with `StoreError::Conflict` when the stored revision has moved on.
    async fn replace(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<AvailabilityWindow>, StoreError>;

    async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>, StoreError>;
}

#[derive(Default)]
pub struct InMemoryAvailabilityRepository {
    windows: RwLock<HashMap<Uuid, AvailabilityWindow>>,
}

impl InMemoryAvailabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityRepository {
    async fn insert(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let mut windows = self.windows.write().await;
        if windows.contains_key(&window.id) {
            return Err(StoreError::Conflict(format!("window {} already exists", window.id)));
        }
        windows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn replace(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let mut windows = self.windows.write().await;
        let stored = windows
            .get(&window.id)
            .ok_or_else(|| StoreError::NotFound(format!("window {}", window.id)))?;

        if stored.revision + 1 != window.revision {
            return Err(StoreError::Conflict(format!(
                "window {} is at revision {}",
                window.id, stored.revision
            )));
        }

        windows.insert(window.id, window.clone());
        Ok(window)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.windows
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("window {}", id)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<AvailabilityWindow>, StoreError> {
        Ok(self.windows.read().await.get(&id).cloned())
    }

    async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>, StoreError> {
        let windows = self.windows.read().await;
        let mut result: Vec<AvailabilityWindow> = windows
            .values()
            .filter(|window| window.provider_id == provider_id)
            .cloned()
            .collect();
        result.sort_by_key(|window| (window.start_time, window.id));
        Ok(result)
    }
}

/// Windows stored in the `availability_windows` table through PostgREST.
pub struct SupabaseAvailabilityRepository {
    supabase: SupabaseClient,
}

impl SupabaseAvailabilityRepository {
    pub fn new(supabase: SupabaseClient) -> Self {
        Self { supabase }
    }

    fn first_row(rows: Vec<Value>, context: &str) -> Result<AvailabilityWindow, StoreError> {
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode(format!("{} returned no rows", context)))?;
        Ok(serde_json::from_value(row)?)
    }
}

#[async_trait]
impl AvailabilityRepository for SupabaseAvailabilityRepository {
    async fn insert(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        debug!("Inserting availability window {}", window.id);

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                WINDOWS_TABLE,
                Some(serde_json::to_value(&window)?),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        Self::first_row(rows, "window insert")
    }

    async fn replace(&self, window: AvailabilityWindow) -> Result<AvailabilityWindow, StoreError> {
        let path = format!(
            "{}?id=eq.{}&revision=eq.{}",
            WINDOWS_TABLE,
            window.id,
            window.revision - 1
        );
        let body = json!({
            "applies_to": window.applies_to,
            "start_time": window.start_time,
            "end_time": window.end_time,
            "slot_duration_minutes": window.slot_duration_minutes,
            "breaks": window.breaks,
            "revision": window.revision,
            "updated_at": window.updated_at,
        });

        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        // A filtered PATCH matching nothing means the revision moved on.
        if rows.is_empty() {
            return Err(StoreError::Conflict(format!(
                "window {} is no longer at revision {}",
                window.id,
                window.revision - 1
            )));
        }

        Self::first_row(rows, "window replace")
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let path = format!("{}?id=eq.{}", WINDOWS_TABLE, id);
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, None, Some(SupabaseClient::return_representation()))
            .await?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("window {}", id)));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<AvailabilityWindow>, StoreError> {
        let path = format!("{}?id=eq.{}", WINDOWS_TABLE, id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        rows.into_iter()
            .next()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .transpose()
    }

    async fn list_for_provider(&self, provider_id: Uuid) -> Result<Vec<AvailabilityWindow>, StoreError> {
        let path = format!(
            "{}?provider_id=eq.{}&order=start_time.asc,id.asc",
            WINDOWS_TABLE, provider_id
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;

        let windows = rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()?;

        debug!("Loaded {} windows for provider {}", windows.len(), provider_id);
        Ok(windows)
    }
}
