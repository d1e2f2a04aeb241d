//! Bearer token inspection.
//!
//! Tokens are read, not verified: signature and expiry checks belong to the
//! authentication layer in front of the decision engine, and the identity
//! server re-validates the token when it is presented for a permission grant.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

/// Errors that can occur while inspecting a bearer token
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is not a compact JWT")]
    Malformed,
    #[error("Token payload is not valid base64url: {0}")]
    Encoding(String),
    #[error("Token payload is not a valid claim set: {0}")]
    Claims(String),
    #[error("Token has no issuer claim")]
    MissingIssuer,
    #[error("Issuer '{0}' does not identify a realm")]
    InvalidIssuer(String),
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    sid: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Claims the decision pipeline reads from a bearer token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub issuer: String,
    pub subject: Option<String>,
    pub session_id: Option<String>,
    /// `exp` claim in seconds since the epoch
    pub expires_at: Option<i64>,
}

impl SessionClaims {
    /// Resolve the identity server and realm that issued the token
    pub fn realm_location(&self) -> Result<RealmLocation, TokenError> {
        RealmLocation::from_issuer(&self.issuer)
    }
}

/// Parse a compact JWT into [`SessionClaims`] without checking its signature
pub fn inspect(token: &str) -> Result<SessionClaims, TokenError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(_), None) if !header.is_empty() && !payload.is_empty() => {
            payload
        }
        _ => return Err(TokenError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Encoding(e.to_string()))?;
    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Claims(e.to_string()))?;

    let issuer = non_empty(raw.iss).ok_or(TokenError::MissingIssuer)?;
    Ok(SessionClaims {
        issuer,
        subject: non_empty(raw.sub),
        session_id: non_empty(raw.sid),
        expires_at: raw.exp,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Extract the token from an `Authorization: Bearer <token>` header.
///
/// Returns `None` for a missing header, another scheme or an empty token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Identity server base URL and realm name, derived from a token issuer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RealmLocation {
    /// Base URL without a trailing slash, e.g. `https://idp.example.com/auth`
    pub server_url: String,
    pub realm: String,
}

impl RealmLocation {
    pub fn new(server_url: impl Into<String>, realm: impl Into<String>) -> Self {
        let server_url = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            realm: realm.into(),
        }
    }

    /// Split an issuer of the form `{server_url}/realms/{realm}`
    pub fn from_issuer(issuer: &str) -> Result<Self, TokenError> {
        let invalid = || TokenError::InvalidIssuer(issuer.to_string());

        let url = Url::parse(issuer).map_err(|_| invalid())?;
        if !matches!(url.scheme(), "http" | "https") || url.query().is_some() {
            return Err(invalid());
        }

        let path = url.path().trim_end_matches('/');
        let (prefix, realm) = path.rsplit_once("/realms/").ok_or_else(invalid)?;
        if realm.is_empty() || realm.contains('/') {
            return Err(invalid());
        }

        Ok(Self::new(
            format!("{}{}", url.origin().ascii_serialization(), prefix),
            realm,
        ))
    }

    /// `{server_url}/realms/{realm}/protocol/openid-connect/token`
    pub fn token_endpoint(&self) -> Result<Url, url::ParseError> {
        self.endpoint(&["realms", &self.realm, "protocol", "openid-connect", "token"])
    }

    /// `{server_url}/admin/realms/{realm}/{segments..}`
    pub fn admin_endpoint(&self, segments: &[&str]) -> Result<Url, url::ParseError> {
        let mut path = vec!["admin", "realms", self.realm.as_str()];
        path.extend_from_slice(segments);
        self.endpoint(&path)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.server_url)?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}
