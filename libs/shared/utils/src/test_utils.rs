use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{CallerIdentity, CallerRole};

use crate::extractor::{CALLER_ID_HEADER, CALLER_ROLE_HEADER};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub store_timeout_ms: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
            store_timeout_ms: 500,
            cache_ttl_seconds: 60,
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            store_timeout_ms: self.store_timeout_ms,
            cache_ttl_seconds: self.cache_ttl_seconds,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestCaller {
    pub id: Uuid,
    pub role: CallerRole,
}

impl TestCaller {
    pub fn new(role: CallerRole) -> Self {
        Self { id: Uuid::new_v4(), role }
    }

    pub fn subject() -> Self {
        Self::new(CallerRole::Subject)
    }

    pub fn provider() -> Self {
        Self::new(CallerRole::Provider)
    }

    pub fn admin() -> Self {
        Self::new(CallerRole::Admin)
    }

    pub fn identity(&self) -> CallerIdentity {
        CallerIdentity::new(self.id, self.role)
    }

    /// Header pairs the upstream auth layer would attach.
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (CALLER_ID_HEADER, self.id.to_string()),
            (CALLER_ROLE_HEADER, self.role.to_string()),
        ]
    }
}

pub fn at(date: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    date.and_time(hm(hour, minute)).and_utc()
}

pub fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).expect("valid wall-clock time")
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_row(
        id: Uuid,
        provider_id: Uuid,
        subject_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: &str,
        version: i64,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "provider_id": provider_id,
            "subject_id": subject_id,
            "start_time": start.to_rfc3339(),
            "end_time": end.to_rfc3339(),
            "status": status,
            "kind": "follow_up",
            "version": version,
            "notes": null,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn window_row(id: Uuid, provider_id: Uuid, date: NaiveDate) -> serde_json::Value {
        json!({
            "id": id,
            "provider_id": provider_id,
            "applies_to": { "kind": "date", "date": date },
            "start_time": "09:00:00",
            "end_time": "12:00:00",
            "slot_duration_minutes": 30,
            "breaks": [{ "start_time": "10:00:00", "end_time": "10:15:00" }],
            "revision": 1,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({ "message": message })
    }
}
