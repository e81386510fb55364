use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "supabase" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "redis" => Ok(CacheBackend::Redis),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub redis_url: Option<String>,
    pub store_backend: StoreBackend,
    pub cache_backend: CacheBackend,
    pub store_timeout_ms: u64,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    pub auto_confirm_bookings: bool,
    pub max_query_range_days: i64,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            redis_url: None,
            store_backend: StoreBackend::Memory,
            cache_backend: CacheBackend::Memory,
            store_timeout_ms: 3000,
            cache_ttl_seconds: 300,
            cache_max_entries: 10_000,
            auto_confirm_bookings: false,
            max_query_range_days: 92,
            default_page_size: 50,
            max_page_size: 200,
            port: 3000,
        }
    }
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            store_backend: parsed_or("STORE_BACKEND", defaults.store_backend),
            cache_backend: parsed_or("CACHE_BACKEND", defaults.cache_backend),
            store_timeout_ms: parsed_or("STORE_TIMEOUT_MS", defaults.store_timeout_ms),
            cache_ttl_seconds: parsed_or("CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            cache_max_entries: parsed_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            auto_confirm_bookings: parsed_or("AUTO_CONFIRM_BOOKINGS", defaults.auto_confirm_bookings),
            max_query_range_days: parsed_or("MAX_QUERY_RANGE_DAYS", defaults.max_query_range_days),
            default_page_size: parsed_or("DEFAULT_PAGE_SIZE", defaults.default_page_size),
            max_page_size: parsed_or("MAX_PAGE_SIZE", defaults.max_page_size),
            port: parsed_or("PORT", defaults.port),
        };

        if config.store_backend == StoreBackend::Supabase && !config.is_supabase_configured() {
            warn!("STORE_BACKEND=supabase but Supabase is not fully configured");
        }

        if config.cache_backend == CacheBackend::Redis && config.redis_url.is_none() {
            warn!("CACHE_BACKEND=redis but REDIS_URL is not set");
        }

        config
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends_parse_case_insensitively() {
        assert_eq!("Supabase".parse::<StoreBackend>(), Ok(StoreBackend::Supabase));
        assert_eq!(" redis ".parse::<CacheBackend>(), Ok(CacheBackend::Redis));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn defaults_use_memory_backends() {
        let config = AppConfig::default();
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.cache_backend, CacheBackend::Memory);
        assert_eq!(config.store_timeout(), Duration::from_secs(3));
        assert!(!config.is_supabase_configured());
    }
}
