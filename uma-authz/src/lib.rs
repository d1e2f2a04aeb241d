//! # uma-authz
//!
//! Bearer-token authorization against an OpenID Connect identity server that
//! speaks the UMA 2.0 permission protocol.
//!
//! ## Components
//!
//! - **Token inspector:** reads `iss`, `sub` and `sid` from a bearer token.
//! - **Admin token cache:** per-realm privileged tokens, refreshed lazily.
//! - **Identity server client:** token grants, admin user/session lookups and
//!   permission (RPT) requests.
//! - **Decision engine:** turns a request and a requirement into a verdict.

pub mod admin_token;
pub mod cache;
pub mod cancel;
pub mod clock;
pub mod engine;
pub mod error;
pub mod identity;
pub mod requirement;
pub mod store;
pub mod token;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::admin_token::{CachedToken, HandlerKind, RealmAdminTokenCache, TokenCacheKey, TokenKind};
pub use crate::cache::{TokenStore, TokenStoreBackend, TokenStoreConfig, TokenStoreKind, create_token_store};
pub use crate::clock::{Clock, SystemClock};
pub use crate::engine::{AuthorizationDecisionEngine, AuthorizationVerdict, FailureReason, RequestContext};
pub use crate::error::{AdminTokenError, AuthzError, ConfigError, IdentityServerError, StoreError};
pub use crate::identity::{IdentityServer, KeycloakClient};
pub use crate::requirement::{AuthorizationRequirement, RequirementError};
pub use crate::store::{
    ProtectedResourceDirectory, ProtectedResourceStore, RealmAdminConfiguration,
    RealmAdminConfigurationStore, RealmProtectedResource, StaticProtectedResourceStore,
    StaticRealmAdminConfigurationStore,
};
pub use crate::token::{RealmLocation, SessionClaims, TokenError};
