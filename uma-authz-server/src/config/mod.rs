use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};
use serde::Deserialize;
use uma_authz::{RealmAdminConfiguration, RealmProtectedResource, TokenStoreConfig};

/// Environment variable naming the optional configuration file
pub const CONFIG_FILE_ENV: &str = "AUTHZ_CONFIG_FILE";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// The port the server will listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout in seconds for each identity server request
    #[serde(default = "default_identity_server_timeout")]
    pub identity_server_timeout: u64,

    /// Admin token store configuration
    #[serde(default)]
    pub token_store: TokenStoreConfig,

    /// Admin credentials, one entry per realm
    #[serde(default)]
    pub realms: Vec<RealmAdminConfiguration>,

    /// Protected resource registered for each realm
    #[serde(default)]
    pub protected_resources: Vec<RealmProtectedResource>,
}

fn default_port() -> u16 {
    7780
}

fn default_identity_server_timeout() -> u64 {
    5
}

fn default_config_file() -> String {
    "authz.toml".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            identity_server_timeout: default_identity_server_timeout(),
            token_store: TokenStoreConfig::default(),
            realms: Vec::new(),
            protected_resources: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from the optional configuration file, then the
    /// `AUTHZ_` environment variables, which take precedence
    pub fn new() -> Result<Self, String> {
        let file = std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| default_config_file());
        let builder = Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("AUTHZ")
                    .prefix_separator("_")
                    .separator("__")
                    .convert_case(config::Case::Snake),
            );
        Self::load(builder)
    }

    fn load(builder: ConfigBuilder<DefaultState>) -> Result<Self, String> {
        builder
            .build()
            .map_err(|e: ConfigError| e.to_string())?
            .try_deserialize()
            .map_err(|e| e.to_string())
    }

    #[cfg(test)]
    pub fn for_test_with_mock(identity_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0,
            identity_server_timeout: 2,
            token_store: TokenStoreConfig::default(),
            realms: vec![RealmAdminConfiguration {
                server_url: identity_mock.uri(),
                realm: "acme".to_string(),
                client_id: "admin-cli".to_string(),
                username: "realm-admin".to_string(),
                password: "s3cret".to_string(),
            }],
            protected_resources: vec![RealmProtectedResource {
                realm: "acme".to_string(),
                protected_resource_name: "acme-api".to_string(),
            }],
        }
    }
}
