//! # Configuration Management for CacheHaus
//!
//! This crate provides the configuration structures for CacheHaus facades:
//! expiration and access defaults plus the connection source each cache uses.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{CacheConfig, ConnectionParams};
//!
//! // URL source
//! let sessions = CacheConfig::from_url("redis://:secret@localhost:6379")
//!     .with_default_expiration(300)
//!     .with_verbose(true);
//!
//! // Inline source, read-only
//! let pages = CacheConfig::default()
//!     .with_connection(ConnectionParams::new("cache.internal", 6380).with_auth("pw"))
//!     .with_read_only(true);
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [caches.sessions]
//! url = "redis://:secret@localhost:6379"
//! default_expiration = 300
//! verbose = true
//!
//! [caches.pages]
//! read_only = true
//!
//! [caches.pages.connection]
//! host = "cache.internal"
//! port = 6380
//! auth = "pw"
//!
//! [caches.shared]
//! env = "SHARED_REDIS_URL"
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from cachehaus.toml (or the file named by CACHEHAUS_CONFIG)
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./cachehaus.toml";
const CONFIG_PATH_VAR: &str = "CACHEHAUS_CONFIG";

pub const DEFAULT_EXPIRATION_SECONDS: u64 = 900;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Connection JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Environment variable {name} error: {source}")]
    Env {
        name: String,
        #[source]
        source: env::VarError,
    },
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration: one entry per named cache
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub caches: BTreeMap<String, CacheConfig>,
}

/// Configuration of a single cache facade
///
/// At most one of `url`, `env` and `connection` is expected. When several are
/// present the URL wins, then the environment variable, then the inline
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Informational label for the backing store
    pub kind: String,
    /// Log every operation, not only failures
    pub verbose: bool,
    /// Expiration applied to writes that don't carry one (in seconds)
    pub default_expiration: u64,
    /// Suppress every write
    pub read_only: bool,
    /// Reserved; carried but not consumed by any operation
    pub check_on_previous_empty: bool,
    /// Upper bound for establishing the connection (in milliseconds)
    pub connect_timeout_ms: u64,
    /// Connection URL (`redis://:password@host:port`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Name of an environment variable holding a URL or JSON connection params
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Inline connection parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionParams>,
}

/// Inline connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db: Option<i64>,
}

/// Where a cache gets its connection parameters from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSource {
    Url(String),
    Env(String),
    Inline(ConnectionParams),
}

impl AppConfig {
    /// Load configuration from the TOML file named in the environment or the default path
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env file is fine; a malformed one is not
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }

        if let Ok(config_path) = env::var(CONFIG_PATH_VAR) {
            Self::from_file(&config_path)
        } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_file(DEFAULT_CONFIG_PATH)
        } else {
            Err(ConfigError::Invalid(format!(
                "Config path must be specified in .env file as {} or in {} file",
                CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH
            )))
        }
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, cache) in &self.caches {
            cache.validate().map_err(|e| match e {
                ConfigError::Invalid(msg) => {
                    ConfigError::Invalid(format!("cache '{}': {}", name, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            kind: "redis".to_string(),
            verbose: false,
            default_expiration: DEFAULT_EXPIRATION_SECONDS,
            read_only: false,
            check_on_previous_empty: true,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            url: None,
            env: None,
            connection: None,
        }
    }
}

impl CacheConfig {
    /// Configuration connecting through a URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::default().with_url(url)
    }

    /// Configuration reading its connection from an environment variable
    pub fn from_env(var_name: impl Into<String>) -> Self {
        Self::default().with_env(var_name)
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_default_expiration(mut self, seconds: u64) -> Self {
        self.default_expiration = seconds;
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_check_on_previous_empty(mut self, check: bool) -> Self {
        self.check_on_previous_empty = check;
        self
    }

    pub fn with_connect_timeout(mut self, timeout_ms: u64) -> Self {
        self.connect_timeout_ms = timeout_ms;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_env(mut self, var_name: impl Into<String>) -> Self {
        self.env = Some(var_name.into());
        self
    }

    pub fn with_connection(mut self, params: ConnectionParams) -> Self {
        self.connection = Some(params);
        self
    }

    /// Pick the connection source: URL, then environment variable, then inline params
    pub fn source(&self) -> Option<ConnectionSource> {
        if let Some(url) = &self.url {
            return Some(ConnectionSource::Url(url.clone()));
        }
        if let Some(name) = &self.env {
            return Some(ConnectionSource::Env(name.clone()));
        }
        self.connection.clone().map(ConnectionSource::Inline)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kind.is_empty() {
            return Err(ConfigError::Invalid("Cache kind cannot be empty".to_string()));
        }
        if self.default_expiration == 0 {
            return Err(ConfigError::Invalid(
                "Cache default_expiration must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "Cache connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.url, Some(url) if url.is_empty()) {
            return Err(ConfigError::Invalid("Redis URL cannot be empty".to_string()));
        }
        if matches!(&self.env, Some(name) if name.is_empty()) {
            return Err(ConfigError::Invalid(
                "Environment variable name cannot be empty".to_string(),
            ));
        }
        if matches!(&self.connection, Some(params) if params.host.is_empty()) {
            return Err(ConfigError::Invalid(
                "Connection host cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            auth: None,
            db: None,
        }
    }
}

impl ConnectionParams {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            auth: None,
            db: None,
        }
    }

    pub fn with_auth(mut self, auth: impl Into<String>) -> Self {
        self.auth = Some(auth.into());
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = Some(db);
        self
    }

    /// Build connection URL
    pub fn to_url(&self) -> String {
        let mut url = String::from("redis://");
        if let Some(auth) = &self.auth {
            url.push(':');
            url.push_str(&percent_encode(auth));
            url.push('@');
        }
        url.push_str(&format!("{}:{}", self.host, self.port));
        if let Some(db) = self.db {
            url.push_str(&format!("/{}", db));
        }
        url
    }
}

impl ConnectionSource {
    /// Turn the source into a connection URL
    pub fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            ConnectionSource::Url(url) => Ok(url.clone()),
            ConnectionSource::Inline(params) => Ok(params.to_url()),
            ConnectionSource::Env(name) => {
                let value = env::var(name).map_err(|source| ConfigError::Env {
                    name: name.clone(),
                    source,
                })?;
                let value = value.trim();
                if value.starts_with('{') {
                    let params: ConnectionParams = serde_json::from_str(value)?;
                    Ok(params.to_url())
                } else if value.is_empty() {
                    Err(ConfigError::Invalid(format!(
                        "Environment variable {} is empty",
                        name
                    )))
                } else {
                    Ok(value.to_string())
                }
            }
        }
    }
}

fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
