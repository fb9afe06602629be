//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Secrets (OAuth client secret, bearer signing secret, session cookie key
//! material) are loaded from env vars only, never from the TOML, to avoid
//! leaking them through checked-in config files.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use google_auth::GoogleConfig;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleSection,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(skip)]
    pub secrets: Secrets,
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// The single cross-origin caller allowed to hit this API
    pub cors_origin: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// OAuth client settings. The callback URL differs per deployment
/// environment, so it lives in the environment's config file.
#[derive(Debug, Deserialize)]
pub struct GoogleSection {
    pub client_id: String,
    pub redirect_uri: String,
}

/// Persistent store settings
#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Required when backend = "redis"
    #[serde(default)]
    pub redis_url: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: None,
        }
    }
}

/// Which key/value backend the stores run on.
///
/// "memory" keeps everything in-process — local development and tests only,
/// since records vanish on restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Upload limits
#[derive(Debug, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_upload_bytes(),
        }
    }
}

/// Secrets resolved from the environment, never the config file.
#[derive(Debug)]
pub struct Secrets {
    /// GOOGLE_CLIENT_SECRET
    pub google_client_secret: Secret<String>,
    /// TOKEN_SECRET — signs bearer credentials
    pub token_secret: Secret<String>,
    /// SESSION_SECRET — keys the signed session cookie (>= 32 bytes)
    pub session_secret: Secret<String>,
}

impl Default for Secrets {
    fn default() -> Self {
        Self {
            google_client_secret: Secret::new(String::new()),
            token_secret: Secret::new(String::new()),
            session_secret: Secret::new(String::new()),
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_upload_bytes() -> usize {
    100 * 1024 * 1024
}

fn required_env(name: &str) -> common::Result<Secret<String>> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(Secret::new(value)),
        _ => Err(common::Error::Config(format!("{name} must be set"))),
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment secrets.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.server.cors_origin.trim().is_empty() {
            return Err(common::Error::Config("cors_origin must not be empty".into()));
        }

        if config.upload.max_bytes == 0 {
            return Err(common::Error::Config(
                "upload.max_bytes must be greater than 0".into(),
            ));
        }

        if config.store.backend == StoreBackend::Redis && config.store.redis_url.is_none() {
            return Err(common::Error::Config(
                "store.redis_url is required when store.backend = \"redis\"".into(),
            ));
        }

        config.secrets = Secrets {
            google_client_secret: required_env("GOOGLE_CLIENT_SECRET")?,
            token_secret: required_env("TOKEN_SECRET")?,
            session_secret: required_env("SESSION_SECRET")?,
        };

        if config.secrets.session_secret.expose().len() < 32 {
            return Err(common::Error::Config(
                "SESSION_SECRET must be at least 32 bytes".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("upload-gateway.toml")
    }

    /// Assemble the OAuth config handed to the login flow.
    pub fn google_config(&self) -> GoogleConfig {
        GoogleConfig::new(
            self.google.client_id.clone(),
            self.secrets.google_client_secret.clone(),
            self.google.redirect_uri.clone(),
        )
    }
}
