pub mod cache;
pub mod memory;
pub mod redis;
pub mod store;

pub use cache::ScheduleCache;
pub use memory::MemoryCacheStore;
pub use self::redis::RedisCacheStore;
pub use store::CacheStore;
