use super::{TokenStoreBackend, TokenStoreError};
use crate::admin_token::{CachedToken, TokenCacheKey};
use async_trait::async_trait;
use log::error;
use redis::{AsyncCommands, Client, aio::ConnectionManager};

/// Redis-backed token store.
///
/// Entries are JSON documents written with `SET EX`, so Redis drops them once
/// their cache lifetime has passed.
#[derive(Clone)]
pub struct RedisTokenStore {
    _client: Client,
    conn_manager: ConnectionManager,
}

impl RedisTokenStore {
    /// Initialize a new Redis store instance
    pub async fn new(redis_url: &str) -> Result<Self, String> {
        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(err) => {
                return Err(format!("Failed to connect to Redis: {}", err));
            }
        };

        let conn_manager = match ConnectionManager::new(client.clone()).await {
            Ok(manager) => manager,
            Err(err) => {
                return Err(format!(
                    "Failed to create Redis connection manager: {}",
                    err
                ));
            }
        };

        let mut conn = conn_manager.clone();
        if let Err(err) = redis::cmd("PING").query_async::<String>(&mut conn).await {
            return Err(format!("Failed to ping Redis: {}", err));
        }

        Ok(Self {
            conn_manager,
            _client: client,
        })
    }
}

/// `SET EX` rejects a zero expiry
fn expiry_secs(token: &CachedToken) -> u64 {
    token.ttl_seconds.max(1) as u64
}

#[async_trait]
impl TokenStoreBackend for RedisTokenStore {
    async fn set(&self, key: &TokenCacheKey, token: &CachedToken) -> Result<(), TokenStoreError> {
        let serialized = serde_json::to_string(token)?;
        let ttl_secs = expiry_secs(token);
        let mut conn = self.conn_manager.clone();

        match conn
            .set_ex::<_, _, ()>(key.to_string(), serialized, ttl_secs)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("Redis error while setting key {}: {}", key, err);
                Err(TokenStoreError::Redis(err.to_string()))
            }
        }
    }

    async fn get(&self, key: &TokenCacheKey) -> Result<Option<CachedToken>, TokenStoreError> {
        let mut conn = self.conn_manager.clone();

        let result: Option<String> = match conn.get(key.to_string()).await {
            Ok(value) => value,
            Err(err) => {
                if err.kind() == redis::ErrorKind::TypeError {
                    // Key doesn't exist
                    return Ok(None);
                }
                error!("Redis error while getting key {}: {}", key, err);
                return Err(TokenStoreError::Redis(err.to_string()));
            }
        };

        match result {
            Some(value) => serde_json::from_str(&value)
                .map_err(|e| TokenStoreError::Deserialization(e.to_string()))
                .map(Some),
            None => Ok(None),
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {}", err)),
        }
    }
}
