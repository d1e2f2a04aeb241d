//! Identity server collaborator: token grants, admin lookups and UMA permission requests.

pub mod keycloak;

pub use keycloak::KeycloakClient;

use crate::error::IdentityServerError;
use crate::store::RealmAdminConfiguration;
use crate::token::RealmLocation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// OAuth2 token endpoint response
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    /// Access token lifetime in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("refresh_expires_in", &self.refresh_expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

/// User as returned by the admin API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserRepresentation {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Active user session as returned by the admin API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Session start, milliseconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,
    /// Last access, milliseconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_access: Option<i64>,
}

/// Calls the decision pipeline makes against the identity server.
///
/// Every method is a network round trip. Callers race them against a
/// cancellation token; implementations must not leave shared state behind
/// when their future is dropped.
#[async_trait]
pub trait IdentityServer: Send + Sync {
    /// Resource owner password grant with the realm's admin credentials
    async fn password_grant(
        &self,
        config: &RealmAdminConfiguration,
    ) -> Result<TokenResponse, IdentityServerError>;

    /// Refresh grant for a previously issued admin token
    async fn refresh_grant(
        &self,
        config: &RealmAdminConfiguration,
        refresh_token: &str,
    ) -> Result<TokenResponse, IdentityServerError>;

    /// Look up a user by id through the admin API
    async fn get_user(
        &self,
        location: &RealmLocation,
        admin_token: &str,
        user_id: &str,
    ) -> Result<UserRepresentation, IdentityServerError>;

    /// List the active sessions of a user through the admin API
    async fn list_user_sessions(
        &self,
        location: &RealmLocation,
        admin_token: &str,
        user_id: &str,
    ) -> Result<Vec<UserSession>, IdentityServerError>;

    /// Request a requesting party token (RPT) for `permission` on `audience`,
    /// presenting `bearer_token` as the requesting party
    async fn request_party_token(
        &self,
        location: &RealmLocation,
        bearer_token: &str,
        audience: &str,
        permission: &str,
    ) -> Result<TokenResponse, IdentityServerError>;
}
