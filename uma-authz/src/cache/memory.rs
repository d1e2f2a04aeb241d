use super::{TokenStoreBackend, TokenStoreError};
use crate::admin_token::{CachedToken, TokenCacheKey};
use async_trait::async_trait;
use moka::future::Cache as MokaCache;

#[derive(Clone)]
pub struct InMemoryTokenStore {
    cache: MokaCache<TokenCacheKey, CachedToken>,
}

impl InMemoryTokenStore {
    /// Initialize a new in-memory store holding at most `capacity` entries
    pub fn new(capacity: u64) -> Self {
        let cache = MokaCache::builder().max_capacity(capacity).build();
        Self { cache }
    }
}

#[async_trait]
impl TokenStoreBackend for InMemoryTokenStore {
    async fn set(&self, key: &TokenCacheKey, token: &CachedToken) -> Result<(), TokenStoreError> {
        self.cache.insert(key.clone(), token.clone()).await;
        Ok(())
    }

    async fn get(&self, key: &TokenCacheKey) -> Result<Option<CachedToken>, TokenStoreError> {
        Ok(self.cache.get(key).await)
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
