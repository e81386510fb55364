// =====================================================================================
// CACHE CELL - READ-THROUGH SCHEDULE CACHE
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::create_cache_router;
pub use services::{CacheStore, MemoryCacheStore, RedisCacheStore, ScheduleCache};
