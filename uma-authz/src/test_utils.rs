use crate::error::IdentityServerError;
use crate::identity::{IdentityServer, TokenResponse, UserRepresentation, UserSession};
use crate::store::RealmAdminConfiguration;
use crate::token::RealmLocation;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use reqwest::StatusCode;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Build an unsigned compact JWT carrying `claims`
pub(crate) fn make_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub(crate) fn realm_config(server_url: &str, realm: &str) -> RealmAdminConfiguration {
    RealmAdminConfiguration {
        server_url: server_url.to_string(),
        realm: realm.to_string(),
        client_id: "admin-cli".to_string(),
        username: "realm-admin".to_string(),
        password: "s3cret".to_string(),
    }
}

fn rejected(status: StatusCode) -> IdentityServerError {
    IdentityServerError::Status {
        status,
        body: String::new(),
    }
}

#[derive(Default)]
struct FakeState {
    expires_in: Option<i64>,
    fail_password: bool,
    fail_refresh: bool,
    fail_sessions: bool,
    users: HashMap<String, bool>,
    sessions: HashMap<String, Vec<String>>,
    grants: HashSet<String>,
}

/// In-process identity server that counts the calls it receives
#[derive(Default)]
pub(crate) struct FakeIdentityServer {
    pub password_grants: AtomicUsize,
    pub refresh_grants: AtomicUsize,
    pub user_lookups: AtomicUsize,
    pub session_lookups: AtomicUsize,
    pub permission_requests: AtomicUsize,
    issued: AtomicUsize,
    latency: Option<Duration>,
    state: Mutex<FakeState>,
}

impl FakeIdentityServer {
    pub fn new() -> Self {
        let fake = Self::default();
        fake.state().expires_in = Some(600);
        fake
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_expires_in(self, expires_in: Option<i64>) -> Self {
        self.state().expires_in = expires_in;
        self
    }

    pub fn with_user(self, user_id: &str, enabled: bool) -> Self {
        self.state().users.insert(user_id.to_string(), enabled);
        self
    }

    pub fn with_session(self, user_id: &str, session_id: &str) -> Self {
        self.state()
            .sessions
            .entry(user_id.to_string())
            .or_default()
            .push(session_id.to_string());
        self
    }

    pub fn with_grant(self, audience: &str, permission: &str) -> Self {
        self.state().grants.insert(format!("{audience}/{permission}"));
        self
    }

    pub fn failing_password_grant(self) -> Self {
        self.state().fail_password = true;
        self
    }

    pub fn failing_refresh_grant(self) -> Self {
        self.state().fail_refresh = true;
        self
    }

    pub fn failing_session_lookup(self) -> Self {
        self.state().fail_sessions = true;
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake identity server state poisoned")
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn issue(&self) -> TokenResponse {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let expires_in = self.state().expires_in;
        TokenResponse {
            access_token: format!("access-{n}"),
            expires_in,
            refresh_token: Some(format!("refresh-{n}")),
            refresh_expires_in: expires_in,
            token_type: Some("Bearer".to_string()),
        }
    }
}

#[async_trait]
impl IdentityServer for FakeIdentityServer {
    async fn password_grant(
        &self,
        _config: &RealmAdminConfiguration,
    ) -> Result<TokenResponse, IdentityServerError> {
        self.password_grants.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        if self.state().fail_password {
            return Err(rejected(StatusCode::UNAUTHORIZED));
        }
        Ok(self.issue())
    }

    async fn refresh_grant(
        &self,
        _config: &RealmAdminConfiguration,
        _refresh_token: &str,
    ) -> Result<TokenResponse, IdentityServerError> {
        self.refresh_grants.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        if self.state().fail_refresh {
            return Err(rejected(StatusCode::BAD_REQUEST));
        }
        Ok(self.issue())
    }

    async fn get_user(
        &self,
        _location: &RealmLocation,
        _admin_token: &str,
        user_id: &str,
    ) -> Result<UserRepresentation, IdentityServerError> {
        self.user_lookups.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        match self.state().users.get(user_id) {
            Some(enabled) => Ok(UserRepresentation {
                id: user_id.to_string(),
                username: None,
                enabled: *enabled,
            }),
            None => Err(rejected(StatusCode::NOT_FOUND)),
        }
    }

    async fn list_user_sessions(
        &self,
        _location: &RealmLocation,
        _admin_token: &str,
        user_id: &str,
    ) -> Result<Vec<UserSession>, IdentityServerError> {
        self.session_lookups.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        let state = self.state();
        if state.fail_sessions {
            return Err(rejected(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Ok(state
            .sessions
            .get(user_id)
            .into_iter()
            .flatten()
            .map(|id| UserSession {
                id: id.clone(),
                username: None,
                ip_address: None,
                start: None,
                last_access: None,
            })
            .collect())
    }

    async fn request_party_token(
        &self,
        _location: &RealmLocation,
        _bearer_token: &str,
        audience: &str,
        permission: &str,
    ) -> Result<TokenResponse, IdentityServerError> {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await;
        if self
            .state()
            .grants
            .contains(&format!("{audience}/{permission}"))
        {
            Ok(TokenResponse {
                access_token: "rpt".to_string(),
                expires_in: Some(300),
                refresh_token: None,
                refresh_expires_in: None,
                token_type: Some("Bearer".to_string()),
            })
        } else {
            Err(rejected(StatusCode::FORBIDDEN))
        }
    }
}
