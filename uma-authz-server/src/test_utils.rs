use crate::config::Settings;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Access token the mocked identity server issues to the realm admin
pub(crate) const ADMIN_TOKEN: &str = "admin-access-token";

/// Build an unsigned compact JWT carrying `claims`
pub(crate) fn make_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

/// Test fixture for setting up a complete test environment with a mocked
/// identity server.
///
/// The fixture's settings point the `acme` realm at the mock server and
/// register `acme-api` as its protected resource. Endpoints of the mock are
/// mounted per test with the `mount_*` helpers.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///     fixture.mount_admin_token().await;
///     fixture.mount_user("user-1").await;
///     fixture.mount_sessions("user-1", &["session-1"]).await;
///     fixture.mount_grant("invoices#read").await;
///
///     let token = fixture.session_token("user-1", "session-1");
///     let response = fixture
///         .post_authorize(&token, &json!({ "resource": "invoices", "scope": "read" }))
///         .await;
///
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Application state shared with the router
    pub state: AppState,
    /// Configuration settings
    pub settings: Settings,
    /// Mock identity server
    pub identity_mock: MockServer,
}

impl TestFixture {
    /// Creates a new test fixture backed by a fresh mock identity server
    pub async fn new() -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let identity_mock = MockServer::start().await;
        let settings = Settings::for_test_with_mock(&identity_mock);

        let state = AppState::new(settings.clone(), CancellationToken::new())
            .await
            .expect("Failed to create test state");
        let app = create_app(state.clone()).await;

        Self {
            app,
            state,
            settings,
            identity_mock,
        }
    }

    /// Initializes the test logger with customized settings.
    ///
    /// Called by `TestFixture::new()`; only the first call takes effect.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Issuer of tokens for the `acme` realm on the mock server
    pub fn issuer(&self) -> String {
        format!("{}/realms/acme", self.identity_mock.uri())
    }

    /// Token carrying a subject and a session id for the `acme` realm
    pub fn session_token(&self, subject: &str, session_id: &str) -> String {
        make_token(json!({
            "iss": self.issuer(),
            "sub": subject,
            "sid": session_id,
        }))
    }

    /// Creates a request builder with a JSON content type
    pub fn request_builder(&self, method: Method, uri: impl AsRef<str>) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .header("Content-Type", "application/json")
    }

    /// Sends a GET request to the specified URI
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = self
            .request_builder(Method::GET, uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a POST request with a JSON body and custom headers
    pub async fn post_with_headers<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let mut builder = self.request_builder(Method::POST, uri);

        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends `POST /authorize` with `token` as the caller's bearer
    pub async fn post_authorize<T: Serialize>(&self, token: &str, body: &T) -> TestResponse {
        let authorization = format!("Bearer {token}");
        self.post_with_headers("/authorize", body, &[("Authorization", &authorization)])
            .await
    }

    /// Sends a request and returns a TestResponse
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }

    /// Password grant for the realm admin
    pub async fn mount_admin_token(&self) {
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/realms/acme/protocol/openid-connect/token"))
            .and(matchers::body_string_contains("grant_type=password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": ADMIN_TOKEN,
                "expires_in": 300,
                "refresh_token": "admin-refresh-token",
                "refresh_expires_in": 1800,
                "token_type": "Bearer",
            })))
            .mount(&self.identity_mock)
            .await;
    }

    /// Admin lookup of an enabled user
    pub async fn mount_user(&self, user_id: &str) {
        Mock::given(matchers::method("GET"))
            .and(matchers::path(format!("/admin/realms/acme/users/{user_id}")))
            .and(matchers::header("Authorization", format!("Bearer {ADMIN_TOKEN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "username": user_id,
                "enabled": true,
            })))
            .mount(&self.identity_mock)
            .await;
    }

    /// Admin listing of a user's active sessions
    pub async fn mount_sessions(&self, user_id: &str, session_ids: &[&str]) {
        let sessions: Vec<Value> = session_ids
            .iter()
            .map(|id| json!({ "id": id, "userId": user_id }))
            .collect();

        Mock::given(matchers::method("GET"))
            .and(matchers::path(format!(
                "/admin/realms/acme/users/{user_id}/sessions"
            )))
            .and(matchers::header("Authorization", format!("Bearer {ADMIN_TOKEN}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(sessions))
            .mount(&self.identity_mock)
            .await;
    }

    /// UMA grant of `permission` on the `acme-api` resource server.
    ///
    /// Requests for any other permission fall through to the mock server's
    /// default 404 and are therefore denied.
    pub async fn mount_grant(&self, permission: &str) {
        let encoded = permission.replace('#', "%23");
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/realms/acme/protocol/openid-connect/token"))
            .and(matchers::body_string_contains("uma-ticket"))
            .and(matchers::body_string_contains("audience=acme-api"))
            .and(matchers::body_string_contains(format!("permission={encoded}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "requesting-party-token",
                "expires_in": 300,
                "token_type": "Bearer",
            })))
            .mount(&self.identity_mock)
            .await;
    }
}

/// Response from a test request that provides convenient access to status,
/// headers and JSON body.
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
}

impl TestResponse {
    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    /// Asserts that the response status is OK (200)
    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// Converts the response body to the specified type.
    ///
    /// # Panics
    ///
    /// Panics if deserialization fails.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
