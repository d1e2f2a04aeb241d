//! Authorization decision engine.
//!
//! One call to [`AuthorizationDecisionEngine::evaluate`] produces one verdict
//! for one request and one requirement. Conditions that simply mean "this
//! request is not covered" become [`AuthorizationVerdict::Failed`]; a missing
//! user or a closed session is surfaced as an [`AuthzError`] so the caller can
//! ask for re-provisioning or re-login instead of answering "forbidden".

use crate::admin_token::RealmAdminTokenCache;
use crate::cancel::cancellable;
use crate::error::{AdminTokenError, AuthzError};
use crate::identity::IdentityServer;
use crate::requirement::AuthorizationRequirement;
use crate::token::{self, RealmLocation, SessionClaims};
use log::{debug, info, warn};
use reqwest::header::HeaderMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What the engine knows about the inbound request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    headers: HeaderMap,
    authenticated: bool,
}

impl RequestContext {
    pub fn new(headers: HeaderMap, authenticated: bool) -> Self {
        Self {
            headers,
            authenticated,
        }
    }

    /// Context of a request the transport layer has authenticated
    pub fn authenticated(headers: HeaderMap) -> Self {
        Self::new(headers, true)
    }

    pub fn anonymous(headers: HeaderMap) -> Self {
        Self::new(headers, false)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn bearer_token(&self) -> Option<&str> {
        token::bearer_token(&self.headers)
    }
}

/// Why a verdict failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The transport layer did not authenticate the request
    NotAuthenticated,
    /// No `Authorization: Bearer` header
    MissingBearer,
    /// The bearer token or its issuer could not be read
    InvalidToken,
    /// No protected resource is registered for the token's realm
    UnknownResource,
    /// No admin configuration exists for the token's realm
    UnknownRealm,
    /// The identity server or a store could not be reached
    Upstream,
    /// The identity server refused the permission
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationVerdict {
    Succeeded,
    Failed(FailureReason),
}

impl AuthorizationVerdict {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Orchestrates token inspection, session validation and the permission request
#[derive(Clone)]
pub struct AuthorizationDecisionEngine {
    identity: Arc<dyn IdentityServer>,
    admin_tokens: RealmAdminTokenCache,
}

impl AuthorizationDecisionEngine {
    pub fn new(identity: Arc<dyn IdentityServer>, admin_tokens: RealmAdminTokenCache) -> Self {
        Self {
            identity,
            admin_tokens,
        }
    }

    pub fn admin_tokens(&self) -> &RealmAdminTokenCache {
        &self.admin_tokens
    }

    /// Decide whether the request described by `context` holds `requirement`.
    ///
    /// Returns `Err` only for [`AuthzError::UserNotFound`],
    /// [`AuthzError::SessionClosed`] and [`AuthzError::Cancelled`].
    pub async fn evaluate(
        &self,
        context: &RequestContext,
        requirement: &AuthorizationRequirement,
        cancel: &CancellationToken,
    ) -> Result<AuthorizationVerdict, AuthzError> {
        if !context.is_authenticated() {
            debug!("Request is not authenticated, skipping '{}'", requirement);
            return Ok(AuthorizationVerdict::Failed(FailureReason::NotAuthenticated));
        }

        let Some(bearer) = context.bearer_token() else {
            debug!("Request carries no bearer token, skipping '{}'", requirement);
            return Ok(AuthorizationVerdict::Failed(FailureReason::MissingBearer));
        };

        let (claims, location) = match token::inspect(bearer)
            .and_then(|claims| claims.realm_location().map(|location| (claims, location)))
        {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("Bearer token cannot be used for authorization: {}", e);
                return Ok(AuthorizationVerdict::Failed(FailureReason::InvalidToken));
            }
        };

        let lookup = cancellable(cancel, requirement.directory().resource_for_realm(&location.realm))
            .await
            .map_err(|_| AuthzError::Cancelled)?;
        let resource = match lookup {
            Ok(Some(resource)) => resource,
            Ok(None) => {
                debug!("No protected resource registered for realm '{}'", location.realm);
                return Ok(AuthorizationVerdict::Failed(FailureReason::UnknownResource));
            }
            Err(e) => {
                warn!(
                    "Failed to load protected resources for realm '{}': {}",
                    location.realm, e
                );
                return Ok(AuthorizationVerdict::Failed(FailureReason::Upstream));
            }
        };

        // Admin and permission calls only go to the realm's configured server
        let location = match self.trusted_location(&claims, &location) {
            Ok(trusted) => trusted,
            Err(reason) => return Ok(AuthorizationVerdict::Failed(reason)),
        };

        if let Some(reason) = self.validate_session(&claims, &location, cancel).await? {
            return Ok(AuthorizationVerdict::Failed(reason));
        }

        let permission = requirement.to_string();
        let granted = cancellable(
            cancel,
            self.identity
                .request_party_token(&location, bearer, &resource, &permission),
        )
        .await
        .map_err(|_| AuthzError::Cancelled)?;

        match granted {
            Ok(_) => {
                debug!(
                    "Granted '{}' on '{}' in realm '{}'",
                    permission, resource, location.realm
                );
                Ok(AuthorizationVerdict::Succeeded)
            }
            Err(e) => {
                info!(
                    "Denied '{}' on '{}' in realm '{}': {}",
                    permission, resource, location.realm, e
                );
                Ok(AuthorizationVerdict::Failed(FailureReason::Denied))
            }
        }
    }

    /// Configured location of the token's realm, provided the token names
    /// that server as its issuer
    fn trusted_location(
        &self,
        claims: &SessionClaims,
        issued_by: &RealmLocation,
    ) -> Result<RealmLocation, FailureReason> {
        let Some(config) = self.admin_tokens.configuration(&issued_by.realm) else {
            warn!("No admin configuration for realm '{}'", issued_by.realm);
            return Err(FailureReason::UnknownRealm);
        };

        match RealmLocation::from_issuer(&config.issuer()) {
            Ok(configured) if configured == *issued_by => Ok(configured),
            _ => {
                warn!(
                    "Issuer '{}' is not the configured identity server of realm '{}'",
                    claims.issuer, issued_by.realm
                );
                Err(FailureReason::InvalidToken)
            }
        }
    }

    /// Prove that the token's user exists and its session is still open.
    ///
    /// `Ok(None)` means the session is live; `Ok(Some(reason))` means the
    /// check itself could not run.
    async fn validate_session(
        &self,
        claims: &SessionClaims,
        location: &RealmLocation,
        cancel: &CancellationToken,
    ) -> Result<Option<FailureReason>, AuthzError> {
        let Some(subject) = claims.subject.as_deref() else {
            return Err(AuthzError::UserNotFound(
                "token has no subject claim".to_string(),
            ));
        };

        let admin_token = match self
            .admin_tokens
            .try_get_admin_token(&location.realm, cancel)
            .await
        {
            Ok(token) => token,
            Err(AdminTokenError::Cancelled) => return Err(AuthzError::Cancelled),
            Err(AdminTokenError::UnknownRealm(realm)) => {
                warn!("No admin configuration for realm '{}'", realm);
                return Ok(Some(FailureReason::UnknownRealm));
            }
            Err(e) => {
                warn!("Cannot validate session: {}", e);
                return Ok(Some(FailureReason::Upstream));
            }
        };

        let user = cancellable(
            cancel,
            self.identity.get_user(location, &admin_token, subject),
        )
        .await
        .map_err(|_| AuthzError::Cancelled)?;
        match user {
            Ok(user) if user.enabled => {}
            Ok(_) => {
                return Err(AuthzError::UserNotFound(format!(
                    "user '{subject}' is disabled"
                )));
            }
            Err(e) => {
                debug!("User lookup for '{}' failed: {}", subject, e);
                return Err(AuthzError::UserNotFound(format!(
                    "user '{subject}' does not exist"
                )));
            }
        }

        let Some(session_id) = claims.session_id.as_deref() else {
            return Err(AuthzError::SessionClosed(
                "token has no session claim".to_string(),
            ));
        };

        let sessions = cancellable(
            cancel,
            self.identity
                .list_user_sessions(location, &admin_token, subject),
        )
        .await
        .map_err(|_| AuthzError::Cancelled)?;
        match sessions {
            Ok(sessions) if sessions.iter().any(|session| session.id == session_id) => Ok(None),
            Ok(_) => Err(AuthzError::SessionClosed(format!(
                "session '{session_id}' is no longer active"
            ))),
            Err(e) => {
                debug!("Session lookup for '{}' failed: {}", subject, e);
                Err(AuthzError::SessionClosed(format!(
                    "session '{session_id}' could not be confirmed"
                )))
            }
        }
    }
}

impl std::fmt::Debug for AuthorizationDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationDecisionEngine")
            .field("admin_tokens", &self.admin_tokens)
            .finish_non_exhaustive()
    }
}
