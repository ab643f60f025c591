//! Cache layer
//!
//! Process-local caching of expensive read models (campaign statistics,
//! trending hashtags). Entries carry their own TTL and can be invalidated by
//! glob pattern when the underlying data changes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use charity_hub::cache::{create_cache, CacheLayer};
//! use charity_hub::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("campaign:stats", &stats, cache.default_ttl()).await?;
//! cache.delete_pattern("campaign:*").await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// The methods are generic over the cached type, so the trait is used with
/// concrete implementations rather than as a trait object.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values whose key matches a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Shared cache handle
pub type Cache = MemoryCache;

/// Create the cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_uses_config() {
        let config = CacheConfig {
            ttl_seconds: 42,
            max_capacity: 10,
        };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(42));

        cache.set("k", &"v", cache.default_ttl()).await.unwrap();
        assert_eq!(cache.get::<String>("k").await.unwrap().as_deref(), Some("v"));
    }
}
