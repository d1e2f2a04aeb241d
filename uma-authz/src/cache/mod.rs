use crate::admin_token::{CachedToken, TokenCacheKey};
use serde::Deserialize;
use thiserror::Error;

pub mod memory;
pub mod redis;

/// Errors that can occur during token store operations
#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("Failed to serialize value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse value: {0}")]
    Deserialization(String),
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Storage contract for admin token cache entries.
///
/// Implementations must make a single `set` atomic and visible to every
/// subsequent `get` for the same key. They never decide expiry themselves;
/// the admin token cache treats expired entries as absent.
#[async_trait::async_trait]
pub trait TokenStoreBackend: Send + Sync {
    /// Insert or overwrite the entry for `key`
    async fn set(&self, key: &TokenCacheKey, token: &CachedToken) -> Result<(), TokenStoreError>;

    /// Retrieve the entry for `key`
    async fn get(&self, key: &TokenCacheKey) -> Result<Option<CachedToken>, TokenStoreError>;

    /// Returns Ok(()) if healthy, or Err with a descriptive message if unhealthy.
    async fn health_check(&self) -> Result<(), String>;
}

/// Token store selected at runtime from configuration
#[derive(Clone)]
pub enum TokenStore {
    /// In-process store using Moka
    InMemory(memory::InMemoryTokenStore),
    /// Redis store shared between service replicas
    Redis(redis::RedisTokenStore),
}

#[async_trait::async_trait]
impl TokenStoreBackend for TokenStore {
    async fn set(&self, key: &TokenCacheKey, token: &CachedToken) -> Result<(), TokenStoreError> {
        match self {
            Self::InMemory(store) => store.set(key, token).await,
            Self::Redis(store) => store.set(key, token).await,
        }
    }

    async fn get(&self, key: &TokenCacheKey) -> Result<Option<CachedToken>, TokenStoreError> {
        match self {
            Self::InMemory(store) => store.get(key).await,
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(store) => store.health_check().await,
            Self::Redis(store) => store.health_check().await,
        }
    }
}

/// Which token store implementation to use
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TokenStoreKind {
    #[default]
    InMemory,
    Redis,
}

/// Configuration for the admin token store
#[derive(Debug, Deserialize, Clone)]
pub struct TokenStoreConfig {
    /// Store type: "in-memory" (default) or "redis"
    #[serde(default)]
    pub store: TokenStoreKind,

    /// In-memory store configuration
    #[serde(default)]
    pub in_memory: InMemoryStoreConfig,

    /// Redis store configuration
    #[serde(default)]
    pub redis: RedisStoreConfig,
}

impl Default for TokenStoreConfig {
    fn default() -> Self {
        Self {
            store: TokenStoreKind::InMemory,
            in_memory: InMemoryStoreConfig::default(),
            redis: RedisStoreConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of cached entries (default: 1024)
    #[serde(default = "default_in_memory_capacity")]
    pub capacity: u64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_in_memory_capacity(),
        }
    }
}

fn default_in_memory_capacity() -> u64 {
    1024
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisStoreConfig {
    /// Redis connection string
    #[serde(default)]
    pub url: String,
}

/// Create the token store described by `config`
pub async fn create_token_store(config: &TokenStoreConfig) -> Result<TokenStore, TokenStoreError> {
    match config.store {
        TokenStoreKind::InMemory => Ok(TokenStore::InMemory(memory::InMemoryTokenStore::new(
            config.in_memory.capacity,
        ))),
        TokenStoreKind::Redis => {
            if config.redis.url.is_empty() {
                return Err(TokenStoreError::Config(
                    "Redis URL is required for the Redis token store".to_string(),
                ));
            }
            let store = redis::RedisTokenStore::new(&config.redis.url)
                .await
                .map_err(TokenStoreError::Config)?;
            Ok(TokenStore::Redis(store))
        }
    }
}
