use crate::api::authn_middleware::Authentication;
use crate::errors::ApiError;
use crate::openapi::AUTHZ_TAG;
use crate::state::AppState;
use axum::{
    extract::{Extension, Json, State},
    response::{IntoResponse, Response},
};
use http::{HeaderMap, StatusCode};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uma_authz::{AuthorizationRequirement, RequestContext};
use utoipa::ToSchema;

/// Permission the caller asks to hold
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct AuthorizeQuery {
    /// Resource name as registered on the identity server
    resource: String,
    /// Scope on that resource
    scope: String,
}

/// Response type for the authorize endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub(crate) struct AuthorizeResult {
    /// Whether the caller holds the permission
    allowed: bool,
}

#[utoipa::path(
    post,
    path = "/authorize",
    tag = AUTHZ_TAG,
    request_body = AuthorizeQuery,
    params(
        ("Authorization" = String, Header, description = "Caller's bearer token"),
    ),
    responses(
        (status = 200, description = "Authorization decision", body = AuthorizeResult),
        (status = 401, description = "User no longer exists or session closed"),
        (status = 422, description = "Invalid request payload"),
        (status = 503, description = "Service is shutting down")
    )
)]
pub(crate) async fn authorize_handler(
    State(state): State<AppState>,
    Extension(authn): Extension<Authentication>,
    headers: HeaderMap,
    Json(query): Json<AuthorizeQuery>,
) -> Response {
    let requirement =
        match AuthorizationRequirement::new(state.directory.clone(), query.resource, query.scope) {
            Ok(requirement) => requirement,
            Err(err) => return ApiError::from(err).into_response(),
        };

    let context = RequestContext::new(headers, authn.authenticated);
    let cancel = state.shutdown.child_token();

    match state.engine.evaluate(&context, &requirement, &cancel).await {
        Ok(verdict) => {
            debug!("Decision for '{}': {:?}", requirement, verdict);
            let result = AuthorizeResult {
                allowed: verdict.succeeded(),
            };
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => {
            info!("Authorization of '{}' interrupted: {}", requirement, err);
            ApiError::from(err).into_response()
        }
    }
}
