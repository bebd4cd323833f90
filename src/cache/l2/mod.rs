pub mod backend;
pub mod error;
pub mod manager;
pub mod memory;
pub mod redis_store;

#[cfg(test)]
mod tests;

pub use backend::DistributedCache;
pub use error::{DistributedCacheError, DistributedCacheResult};
pub use manager::{DistributedCacheManager, Stored};
pub use memory::{InMemoryDistributedCache, OpCounts};
pub use redis_store::RedisDistributedCache;
