mod authn_middleware;
pub(crate) mod authorize;
pub(crate) mod health;

use crate::api::authn_middleware::authentication_middleware;
use crate::state::AppState;
use axum::{middleware, routing::post, Router};

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(decision_routes())
}

/// Routes whose requests go through bearer token authentication
fn decision_routes() -> Router<AppState> {
    Router::new()
        .route("/authorize", post(authorize::authorize_handler))
        .route_layer(middleware::from_fn(authentication_middleware))
}
