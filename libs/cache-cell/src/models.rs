use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::DateRange;

/// Identity of a cached computation. Every key belongs to exactly one provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Slot set for one provider on one date.
    Slots { provider_id: Uuid, date: NaiveDate },
    /// Appointment range query; `variant` distinguishes filters and pages.
    Range {
        provider_id: Uuid,
        range: DateRange,
        variant: String,
    },
}

impl CacheKey {
    pub fn slots(provider_id: Uuid, date: NaiveDate) -> Self {
        CacheKey::Slots { provider_id, date }
    }

    pub fn range(provider_id: Uuid, range: DateRange, variant: impl Into<String>) -> Self {
        CacheKey::Range {
            provider_id,
            range,
            variant: variant.into(),
        }
    }

    pub fn provider_id(&self) -> Uuid {
        match self {
            CacheKey::Slots { provider_id, .. } | CacheKey::Range { provider_id, .. } => *provider_id,
        }
    }

    /// Calendar dates whose data this entry was computed from.
    pub fn dates(&self) -> DateRange {
        match self {
            CacheKey::Slots { date, .. } => DateRange::single(*date),
            CacheKey::Range { range, .. } => *range,
        }
    }

    pub fn touches(&self, provider_id: Uuid, dates: &DateRange) -> bool {
        let own = self.dates();
        self.provider_id() == provider_id && own.from <= dates.to && dates.from <= own.to
    }

    pub fn render(&self) -> String {
        match self {
            CacheKey::Slots { provider_id, date } => format!("sched:slots:{}:{}", provider_id, date),
            CacheKey::Range { provider_id, range, variant } => {
                format!("sched:range:{}:{}:{}:{}", provider_id, range.from, range.to, variant)
            }
        }
    }

    /// Inverse of `render`, used when scanning a provider's key index.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(6, ':');
        if parts.next()? != "sched" {
            return None;
        }

        match parts.next()? {
            "slots" => {
                let provider_id = Uuid::parse_str(parts.next()?).ok()?;
                let date = parts.next()?.parse().ok()?;
                Some(CacheKey::Slots { provider_id, date })
            }
            "range" => {
                let provider_id = Uuid::parse_str(parts.next()?).ok()?;
                let from = parts.next()?.parse().ok()?;
                let to = parts.next()?.parse().ok()?;
                let variant = parts.next().unwrap_or_default().to_string();
                let range = DateRange::new(from, to).ok()?;
                Some(CacheKey::Range { provider_id, range, variant })
            }
            _ => None,
        }
    }
}

/// Which of a provider's entries a write affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    Dates(DateRange),
    /// Recurring availability changes touch an unbounded set of dates.
    AllDates,
}

/// What is physically stored under a key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEnvelope {
    pub epoch: u64,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub backend: String,
    pub hits: u64,
    pub misses: u64,
    pub stale_rejections: u64,
    pub invalidations: u64,
    pub hit_rate: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
