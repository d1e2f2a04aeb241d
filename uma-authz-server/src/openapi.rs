use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const AUTHZ_TAG: &str = "Authorization API";

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::health::health_check,
        crate::api::health::ready_check,
        crate::api::authorize::authorize_handler,
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = AUTHZ_TAG, description = "UMA permission decisions"),
    ),
    info(
        title = "UMA Authorization API",
        description = "Bearer token authorization against an identity server",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
