use crate::config::Settings;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uma_authz::cache::TokenStoreError;
use uma_authz::{
    create_token_store, AuthorizationDecisionEngine, ConfigError, KeycloakClient,
    ProtectedResourceDirectory, RealmAdminTokenCache, StaticProtectedResourceStore,
    StaticRealmAdminConfigurationStore, TokenStore,
};

/// Errors that prevent the service from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to create identity server client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("Failed to create token store: {0}")]
    TokenStore(#[from] TokenStoreError),
    #[error("Invalid realm configuration: {0}")]
    Realms(#[from] ConfigError),
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub engine: Arc<AuthorizationDecisionEngine>,
    pub directory: ProtectedResourceDirectory,
    /// Cancelled on shutdown; every decision runs under a child token
    pub shutdown: CancellationToken,
}

impl AppState {
    fn create_identity_client(timeout: u64) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(2))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
    }

    pub async fn new(settings: Settings, shutdown: CancellationToken) -> Result<Self, StartupError> {
        let store = create_token_store(&settings.token_store).await?;
        Self::with_token_store(settings, store, shutdown).await
    }

    pub async fn with_token_store(
        settings: Settings,
        store: TokenStore,
        shutdown: CancellationToken,
    ) -> Result<Self, StartupError> {
        let identity = Arc::new(KeycloakClient::new(Self::create_identity_client(
            settings.identity_server_timeout,
        )?));

        let realms = StaticRealmAdminConfigurationStore::new(settings.realms.clone());
        let admin_tokens = RealmAdminTokenCache::new(&realms, identity.clone(), store).await?;

        let directory = ProtectedResourceDirectory::new(Arc::new(
            StaticProtectedResourceStore::new(settings.protected_resources.clone()),
        ));

        Ok(Self {
            settings: Arc::new(settings),
            engine: Arc::new(AuthorizationDecisionEngine::new(identity, admin_tokens)),
            directory,
            shutdown,
        })
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> Result<(), String> {
        self.engine.admin_tokens().health_check().await
    }
}
