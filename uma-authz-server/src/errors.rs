use axum::response::IntoResponse;
use axum::Json;
use http::header::WWW_AUTHENTICATE;
use http::{HeaderValue, StatusCode};
use serde_json::json;
use uma_authz::{AuthzError, RequirementError};

/// Challenge sent when the caller must authenticate again
const INVALID_TOKEN_CHALLENGE: &str = r#"Bearer error="invalid_token""#;

#[derive(Debug, Clone)]
pub struct ApiError {
    pub detail: String,
    pub status_code: StatusCode,
    /// Machine-readable error code
    pub error: Option<&'static str>,
    /// Value of the `WWW-Authenticate` header, if any
    pub challenge: Option<&'static str>,
}

impl ApiError {
    /// Create a new ApiError with a detail message and status code
    pub fn new<S: ToString>(detail: S, status_code: StatusCode) -> Self {
        Self {
            detail: detail.to_string(),
            status_code,
            error: None,
            challenge: None,
        }
    }

    /// Create new Unprocessable Entity (422) with a detail message
    pub fn unprocessable<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::UNPROCESSABLE_ENTITY)
    }

    /// Create new Service Unavailable (503) with a detail message
    pub fn unavailable<S: ToString>(detail: S) -> Self {
        Self::new(detail, StatusCode::SERVICE_UNAVAILABLE)
    }

    /// Create new Unauthorized (401) carrying an error code
    pub fn unauthorized<S: ToString>(detail: S, error: &'static str) -> Self {
        Self {
            error: Some(error),
            ..Self::new(detail, StatusCode::UNAUTHORIZED)
        }
    }

    pub fn with_challenge(mut self, challenge: &'static str) -> Self {
        self.challenge = Some(challenge);
        self
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::UserNotFound(_) => ApiError::unauthorized(err, "user_not_found"),
            AuthzError::SessionClosed(_) => ApiError::unauthorized(err, "session_closed")
                .with_challenge(INVALID_TOKEN_CHALLENGE),
            AuthzError::Cancelled => ApiError::unavailable("Service is shutting down"),
        }
    }
}

impl From<RequirementError> for ApiError {
    fn from(err: RequirementError) -> Self {
        ApiError::unprocessable(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code;
        let mut body = json!({
            "detail": self.detail,
        });
        if let Some(error) = self.error {
            body["error"] = json!(error);
        }

        let mut response = (status_code, Json(body)).into_response();
        if let Some(challenge) = self.challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        response
    }
}
