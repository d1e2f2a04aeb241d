//! Per-realm administrative token cache.
//!
//! Privileged tokens are needed to look up users and sessions through the
//! identity server's admin API. Acquiring one is a full password grant, so
//! tokens are cached per realm and shared by every concurrent decision.
//! Renewal is lazy: the first caller to see an expired entry renews it.

use crate::cache::{TokenStore, TokenStoreBackend};
use crate::cancel::cancellable;
use crate::clock::{Clock, SystemClock};
use crate::error::{AdminTokenError, ConfigError, IdentityServerError};
use crate::identity::{IdentityServer, TokenResponse};
use crate::store::{RealmAdminConfiguration, RealmAdminConfigurationStore};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Seconds shaved off the server-reported lifetime of an access token
pub const ACCESS_TOKEN_MARGIN_SECS: i64 = 120;
/// Seconds shaved off the server-reported lifetime of a refresh token
pub const REFRESH_TOKEN_MARGIN_SECS: i64 = 300;
/// Cache lifetime used when the margin-adjusted lifetime is not positive
pub const FALLBACK_TTL_SECS: i64 = 60;

/// Component a cached token belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    UmaPermission,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UmaPermission => f.write_str("uma-permission"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Safety margin subtracted from the server-reported lifetime
    pub fn margin_secs(self) -> i64 {
        match self {
            Self::Access => ACCESS_TOKEN_MARGIN_SECS,
            Self::Refresh => REFRESH_TOKEN_MARGIN_SECS,
        }
    }

    /// Cache lifetime for a token the server says lives `expires_in` seconds
    pub fn effective_ttl(self, expires_in: Option<i64>) -> i64 {
        let adjusted = expires_in.unwrap_or(0).saturating_sub(self.margin_secs());
        if adjusted > 0 { adjusted } else { FALLBACK_TTL_SECS }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// Typed key of a token store entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenCacheKey {
    pub handler: HandlerKind,
    pub realm: String,
    pub kind: TokenKind,
}

impl TokenCacheKey {
    pub fn new(handler: HandlerKind, realm: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            handler,
            realm: realm.into(),
            kind,
        }
    }
}

/// `admin-token:{handler}:{kind}:{realm}`; the realm goes last so that a realm
/// containing ':' cannot collide with another key.
impl fmt::Display for TokenCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "admin-token:{}:{}:{}", self.handler, self.kind, self.realm)
    }
}

/// A token value together with the moment it stops being usable
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub ttl_seconds: i64,
}

impl CachedToken {
    pub fn new(value: impl Into<String>, issued_at: DateTime<Utc>, ttl_seconds: i64) -> Self {
        Self {
            value: value.into(),
            issued_at,
            ttl_seconds,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.ttl_seconds)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("issued_at", &self.issued_at)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

/// Shared cache of administrative tokens, one access/refresh pair per realm
#[derive(Clone)]
pub struct RealmAdminTokenCache {
    realms: Arc<HashMap<String, RealmAdminConfiguration>>,
    identity: Arc<dyn IdentityServer>,
    store: TokenStore,
    clock: Arc<dyn Clock>,
    handler: HandlerKind,
}

impl RealmAdminTokenCache {
    /// Build the cache from every configuration in `config_store`.
    ///
    /// All entries are validated up front; a single invalid or duplicated
    /// realm fails construction for the whole set.
    pub async fn new(
        config_store: &dyn RealmAdminConfigurationStore,
        identity: Arc<dyn IdentityServer>,
        store: TokenStore,
    ) -> Result<Self, ConfigError> {
        let configurations = config_store.get_realms_admin_configuration().await?;

        let mut realms = HashMap::with_capacity(configurations.len());
        for (entry, config) in configurations.into_iter().enumerate() {
            config.validate(entry)?;
            if realms.contains_key(&config.realm) {
                return Err(ConfigError::DuplicateRealm(config.realm));
            }
            realms.insert(config.realm.clone(), config);
        }
        info!("Admin token cache configured for {} realm(s)", realms.len());

        Ok(Self {
            realms: Arc::new(realms),
            identity,
            store,
            clock: Arc::new(SystemClock),
            handler: HandlerKind::UmaPermission,
        })
    }

    /// Replace the clock used for expiry bookkeeping
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Admin configuration for `realm`, if configured
    pub fn configuration(&self, realm: &str) -> Option<&RealmAdminConfiguration> {
        self.realms.get(realm)
    }

    /// Names of the configured realms
    pub fn realms(&self) -> impl Iterator<Item = &str> {
        self.realms.keys().map(String::as_str)
    }

    /// Health of the underlying token store
    pub async fn health_check(&self) -> Result<(), String> {
        self.store.health_check().await
    }

    /// Return a non-expired admin access token for `realm`.
    ///
    /// Tries, in order: the cached access token, a refresh grant with the
    /// cached refresh token, a full password grant. Nothing is cached when
    /// every path fails or when `cancel` fires.
    pub async fn try_get_admin_token(
        &self,
        realm: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AdminTokenError> {
        let config = self
            .realms
            .get(realm)
            .ok_or_else(|| AdminTokenError::UnknownRealm(realm.to_string()))?;

        if let Some(access) = self.cached(realm, TokenKind::Access).await {
            debug!("Using cached admin token for realm '{}'", realm);
            return Ok(access.value);
        }

        if let Some(refresh) = self.cached(realm, TokenKind::Refresh).await {
            let refreshed = cancellable(cancel, self.identity.refresh_grant(config, &refresh.value))
                .await
                .map_err(|_| AdminTokenError::Cancelled)?;
            match refreshed {
                Ok(response) => {
                    debug!("Refreshed admin token for realm '{}'", realm);
                    return Ok(self.store_tokens(realm, response).await);
                }
                Err(e) => warn!(
                    "Refreshing admin token for realm '{}' failed, falling back to password grant: {}",
                    realm, e
                ),
            }
        }

        let granted = cancellable(cancel, self.identity.password_grant(config))
            .await
            .map_err(|_| AdminTokenError::Cancelled)?;
        match granted {
            Ok(response) => {
                debug!("Acquired admin token for realm '{}'", realm);
                Ok(self.store_tokens(realm, response).await)
            }
            Err(source) => Err(self.unavailable(realm, source)),
        }
    }

    fn unavailable(&self, realm: &str, source: IdentityServerError) -> AdminTokenError {
        warn!("Admin token for realm '{}' is unavailable: {}", realm, source);
        AdminTokenError::Unavailable {
            realm: realm.to_string(),
            source,
        }
    }

    fn key(&self, realm: &str, kind: TokenKind) -> TokenCacheKey {
        TokenCacheKey::new(self.handler, realm, kind)
    }

    /// Cached entry of `kind` for `realm`, if present and not expired.
    ///
    /// A failing store degrades to a cache miss.
    async fn cached(&self, realm: &str, kind: TokenKind) -> Option<CachedToken> {
        let key = self.key(realm, kind);
        match self.store.get(&key).await {
            Ok(Some(token)) if !token.is_expired_at(self.clock.now()) => Some(token),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read {} from token store: {}", key, e);
                None
            }
        }
    }

    /// Cache the tokens of a successful grant and return the access token.
    ///
    /// The refresh entry is written first so a reader that sees the new
    /// access token never pairs it with an older refresh token.
    async fn store_tokens(&self, realm: &str, response: TokenResponse) -> String {
        let issued_at = self.clock.now();

        if let Some(refresh_token) = response.refresh_token {
            let entry = CachedToken::new(
                refresh_token,
                issued_at,
                TokenKind::Refresh.effective_ttl(response.expires_in),
            );
            self.put(self.key(realm, TokenKind::Refresh), &entry).await;
        }

        let entry = CachedToken::new(
            response.access_token,
            issued_at,
            TokenKind::Access.effective_ttl(response.expires_in),
        );
        self.put(self.key(realm, TokenKind::Access), &entry).await;
        entry.value
    }

    async fn put(&self, key: TokenCacheKey, token: &CachedToken) {
        if let Err(e) = self.store.set(&key, token).await {
            warn!("Failed to write {} to token store: {}", key, e);
        }
    }
}

impl fmt::Debug for RealmAdminTokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealmAdminTokenCache")
            .field("realms", &self.realms.keys().collect::<Vec<_>>())
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}
