//! Keycloak-compatible identity server client

use super::{IdentityServer, TokenResponse, UserRepresentation, UserSession};
use crate::error::IdentityServerError;
use crate::store::RealmAdminConfiguration;
use crate::token::RealmLocation;
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

const UMA_TICKET_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Identity server client speaking the Keycloak REST dialect
#[derive(Clone)]
pub struct KeycloakClient {
    client: Client,
}

impl KeycloakClient {
    /// Create a new client on top of a configured HTTP client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn request_token(
        &self,
        location: &RealmLocation,
        bearer_token: Option<&str>,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, IdentityServerError> {
        let url = location.token_endpoint()?;
        debug!("Requesting token from {}", url);

        let mut request = self.client.post(url).form(form);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        read_json(response)
            .await?
            .ok_or(IdentityServerError::EmptyPayload)
    }

    async fn admin_get<R: DeserializeOwned>(
        &self,
        url: Url,
        admin_token: &str,
    ) -> Result<Option<R>, IdentityServerError> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).bearer_auth(admin_token).send().await?;
        read_json(response).await
    }
}

/// Decode a JSON response; `204 No Content` and empty bodies yield `None`
async fn read_json<R: DeserializeOwned>(
    response: Response,
) -> Result<Option<R>, IdentityServerError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IdentityServerError::Status { status, body });
    }
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }

    let body = response.bytes().await?;
    if body.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(&body)?))
}

#[async_trait]
impl IdentityServer for KeycloakClient {
    async fn password_grant(
        &self,
        config: &RealmAdminConfiguration,
    ) -> Result<TokenResponse, IdentityServerError> {
        self.request_token(
            &config.location(),
            None,
            &[
                ("grant_type", "password"),
                ("client_id", config.client_id.as_str()),
                ("username", config.username.as_str()),
                ("password", config.password.as_str()),
            ],
        )
        .await
    }

    async fn refresh_grant(
        &self,
        config: &RealmAdminConfiguration,
        refresh_token: &str,
    ) -> Result<TokenResponse, IdentityServerError> {
        self.request_token(
            &config.location(),
            None,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", config.client_id.as_str()),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn get_user(
        &self,
        location: &RealmLocation,
        admin_token: &str,
        user_id: &str,
    ) -> Result<UserRepresentation, IdentityServerError> {
        let url = location.admin_endpoint(&["users", user_id])?;
        self.admin_get(url, admin_token)
            .await?
            .ok_or(IdentityServerError::EmptyPayload)
    }

    async fn list_user_sessions(
        &self,
        location: &RealmLocation,
        admin_token: &str,
        user_id: &str,
    ) -> Result<Vec<UserSession>, IdentityServerError> {
        let url = location.admin_endpoint(&["users", user_id, "sessions"])?;
        Ok(self.admin_get(url, admin_token).await?.unwrap_or_default())
    }

    async fn request_party_token(
        &self,
        location: &RealmLocation,
        bearer_token: &str,
        audience: &str,
        permission: &str,
    ) -> Result<TokenResponse, IdentityServerError> {
        self.request_token(
            location,
            Some(bearer_token),
            &[
                ("grant_type", UMA_TICKET_GRANT_TYPE),
                ("audience", audience),
                ("permission", permission),
            ],
        )
        .await
    }
}
