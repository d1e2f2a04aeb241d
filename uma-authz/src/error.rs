use thiserror::Error;

/// Errors raised while validating realm admin configuration.
///
/// These are fatal: an admin token cache is never built from a configuration
/// set that contains a single invalid entry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Realm configuration #{entry} is invalid: '{field}' must not be empty")]
    MissingField { entry: usize, field: &'static str },

    #[error("Realm configuration #{entry} has an invalid server URL '{url}': {reason}")]
    InvalidServerUrl {
        entry: usize,
        url: String,
        reason: String,
    },

    #[error("Realm '{0}' is configured more than once")]
    DuplicateRealm(String),

    #[error("Failed to load realm configuration: {0}")]
    Store(#[from] StoreError),
}

/// Errors returned by configuration and protected resource stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while talking to the identity server
#[derive(Debug, Error)]
pub enum IdentityServerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Identity server responded with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Identity server returned an empty payload")]
    EmptyPayload,

    #[error("Failed to parse identity server response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid identity server URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Errors returned by [`crate::RealmAdminTokenCache::try_get_admin_token`]
#[derive(Debug, Error)]
pub enum AdminTokenError {
    #[error("No admin configuration for realm '{0}'")]
    UnknownRealm(String),

    #[error("Admin token for realm '{realm}' is unavailable: {source}")]
    Unavailable {
        realm: String,
        #[source]
        source: IdentityServerError,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Errors that escape [`crate::AuthorizationDecisionEngine::evaluate`].
///
/// Ordinary denials are verdicts, not errors. Only conditions that need a
/// different remediation than "forbidden" are surfaced here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The caller's identity no longer exists (or is disabled) on the identity server
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The caller's session has been closed on the identity server
    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Authorization cancelled")]
    Cancelled,
}
