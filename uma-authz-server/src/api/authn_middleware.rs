use axum::{
    body::Body,
    extract::Request,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use log::{debug, warn};
use uma_authz::token::{bearer_token, inspect};

/// Outcome of the transport-level authentication of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Authentication {
    pub authenticated: bool,
}

/// Mark the request as authenticated when its bearer token decodes and has
/// not expired.
///
/// Signatures are checked by the gateway in front of this service. Nothing is
/// rejected here: unauthenticated requests reach the decision engine, which
/// answers them with a failed verdict.
pub(super) async fn authentication_middleware(mut request: Request<Body>, next: Next) -> Response {
    let authenticated = match bearer_token(request.headers()) {
        None => {
            debug!("Request has no bearer token");
            false
        }
        Some(token) => match inspect(token) {
            Ok(claims) => match claims.expires_at {
                Some(exp) if exp <= Utc::now().timestamp() => {
                    warn!("Bearer token issued by '{}' has expired", claims.issuer);
                    false
                }
                _ => true,
            },
            Err(e) => {
                warn!("Failed to decode bearer token: {}", e);
                false
            }
        },
    };

    request
        .extensions_mut()
        .insert(Authentication { authenticated });
    next.run(request).await
}
