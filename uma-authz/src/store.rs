//! Realm admin configuration and protected resource stores.
//!
//! Both stores hand out full snapshots; filtering by realm happens on the
//! caller's side.

use crate::error::{ConfigError, StoreError};
use crate::token::RealmLocation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// Static per-realm settings used to obtain administrative tokens
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealmAdminConfiguration {
    /// Identity server base URL, e.g. `https://idp.example.com`
    pub server_url: String,
    /// Realm name
    pub realm: String,
    /// Public client used for the resource owner password grant
    pub client_id: String,
    /// Administrative user name
    pub username: String,
    /// Administrative user password
    #[serde(default)]
    pub password: String,
}

impl std::fmt::Debug for RealmAdminConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmAdminConfiguration")
            .field("server_url", &self.server_url)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl RealmAdminConfiguration {
    /// Check that every required field is present.
    ///
    /// `entry` is the position of this configuration in its store and only
    /// used for error reporting.
    pub fn validate(&self, entry: usize) -> Result<(), ConfigError> {
        let required = [
            ("server_url", &self.server_url),
            ("realm", &self.realm),
            ("client_id", &self.client_id),
            ("username", &self.username),
            ("password", &self.password),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField { entry, field });
            }
        }

        let url = Url::parse(&self.server_url).map_err(|e| ConfigError::InvalidServerUrl {
            entry,
            url: self.server_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidServerUrl {
                entry,
                url: self.server_url.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(())
    }

    /// Issuer claim of tokens minted by this realm
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server_url.trim_end_matches('/'), self.realm)
    }

    /// Where this realm's token endpoint lives
    pub fn location(&self) -> RealmLocation {
        RealmLocation::new(&self.server_url, &self.realm)
    }
}

/// A protected resource registered for a realm
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealmProtectedResource {
    pub realm: String,
    /// Resource server (client) identifier used as the permission audience
    pub protected_resource_name: String,
}

/// Source of realm admin configuration
#[async_trait]
pub trait RealmAdminConfigurationStore: Send + Sync {
    async fn get_realms_admin_configuration(
        &self,
    ) -> Result<Vec<RealmAdminConfiguration>, StoreError>;
}

/// Source of the realm to protected resource mapping
#[async_trait]
pub trait ProtectedResourceStore: Send + Sync {
    async fn get_realm_protected_resources(&self)
    -> Result<Vec<RealmProtectedResource>, StoreError>;
}

/// Configuration store backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticRealmAdminConfigurationStore {
    realms: Vec<RealmAdminConfiguration>,
}

impl StaticRealmAdminConfigurationStore {
    pub fn new(realms: Vec<RealmAdminConfiguration>) -> Self {
        Self { realms }
    }
}

#[async_trait]
impl RealmAdminConfigurationStore for StaticRealmAdminConfigurationStore {
    async fn get_realms_admin_configuration(
        &self,
    ) -> Result<Vec<RealmAdminConfiguration>, StoreError> {
        Ok(self.realms.clone())
    }
}

/// Protected resource store backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticProtectedResourceStore {
    resources: Vec<RealmProtectedResource>,
}

impl StaticProtectedResourceStore {
    pub fn new(resources: Vec<RealmProtectedResource>) -> Self {
        Self { resources }
    }
}

#[async_trait]
impl ProtectedResourceStore for StaticProtectedResourceStore {
    async fn get_realm_protected_resources(
        &self,
    ) -> Result<Vec<RealmProtectedResource>, StoreError> {
        Ok(self.resources.clone())
    }
}

/// Read-only view over a [`ProtectedResourceStore`]
#[derive(Clone)]
pub struct ProtectedResourceDirectory {
    store: Arc<dyn ProtectedResourceStore>,
}

impl ProtectedResourceDirectory {
    pub fn new(store: Arc<dyn ProtectedResourceStore>) -> Self {
        Self { store }
    }

    /// Full snapshot of the registered resources
    pub async fn get_protected_resources(&self) -> Result<Vec<RealmProtectedResource>, StoreError> {
        self.store.get_realm_protected_resources().await
    }

    /// Protected resource registered for `realm`, if any
    pub async fn resource_for_realm(&self, realm: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .get_protected_resources()
            .await?
            .into_iter()
            .find(|resource| resource.realm == realm)
            .map(|resource| resource.protected_resource_name))
    }
}

impl std::fmt::Debug for ProtectedResourceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedResourceDirectory").finish_non_exhaustive()
    }
}
