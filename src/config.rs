//! ==============================================================================
//! config.rs - Hub Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `hub.toml`.
//!     loads configuration from file (or defaults), then applies environment
//!     overrides so secrets never need to live in the file.
//!
//! structure:
//!     - ServerConfig: bind address and port.
//!     - AuthConfig: the single operator login.
//!     - StoreConfig: history backend, retention limit, firebase connection.
//!     - LoggingConfig: default log level, whether to log every reading.
//!
//! ==============================================================================

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "SOIL_HUB_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// how long a login stays valid
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Firebase,
    /// process-local log, lost on restart
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub firebase: FirebaseConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FirebaseConfig {
    #[serde(default)]
    pub database_url: String,
    /// database secret or id token, sent as `?auth=`
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_node")]
    pub node: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub show_sensor_data: bool,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_session_ttl_secs() -> u64 {
    crate::session::DEFAULT_SESSION_TTL.as_secs()
}

fn default_history_limit() -> usize {
    crate::history::DEFAULT_HISTORY_LIMIT
}

fn default_node() -> String {
    "sensor_data".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            history_limit: default_history_limit(),
            firebase: FirebaseConfig::default(),
        }
    }
}

impl Default for FirebaseConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            auth_token: String::new(),
            node: default_node(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            show_sensor_data: true,
        }
    }
}

impl HubConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve, load, override and validate the startup configuration
    ///
    /// an explicitly named file must exist; the fallback locations are optional.
    /// returns the file that was read, if any. runs before the subscriber is
    /// installed, so the caller logs where the config came from.
    pub fn load_for_startup(
        explicit: Option<PathBuf>,
    ) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let explicit = explicit.or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let (mut config, source) = match explicit {
            Some(path) => (Self::load(&path)?, Some(path)),
            None => Self::load_default_locations()?,
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok((config, source))
    }

    fn load_default_locations() -> Result<(Self, Option<PathBuf>), ConfigError> {
        let paths = [
            PathBuf::from("config").join("hub.toml"),
            PathBuf::from("..").join("config").join("hub.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Apply `SOIL_HUB_*` overrides from `lookup` (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("SOIL_HUB_BIND") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("SOIL_HUB_PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::Invalid {
                key: "SOIL_HUB_PORT",
                reason: format!("{e}"),
            })?;
        }
        if let Some(username) = lookup("SOIL_HUB_ADMIN_USERNAME") {
            self.auth.username = username;
        }
        if let Some(password) = lookup("SOIL_HUB_ADMIN_PASSWORD") {
            self.auth.password = password;
        }
        if let Some(url) = lookup("SOIL_HUB_FIREBASE_URL") {
            self.store.firebase.database_url = url;
        }
        if let Some(token) = lookup("SOIL_HUB_FIREBASE_TOKEN") {
            self.store.firebase.auth_token = token;
        }
        Ok(())
    }

    /// Reject configurations the hub must not start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.username.is_empty() {
            return Err(ConfigError::Missing("auth.username"));
        }
        if self.auth.password.is_empty() {
            return Err(ConfigError::Missing("auth.password"));
        }
        if self.auth.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "auth.session_ttl_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.store.history_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "store.history_limit",
                reason: "must be at least 1".to_string(),
            });
        }
        self.listen_addr()?;

        if self.store.backend == StoreBackend::Firebase {
            let firebase = &self.store.firebase;
            if firebase.database_url.is_empty() {
                return Err(ConfigError::Missing("store.firebase.database_url"));
            }
            if firebase.auth_token.is_empty() {
                return Err(ConfigError::Missing("store.firebase.auth_token"));
            }
            reqwest::Url::parse(&firebase.database_url).map_err(|e| ConfigError::Invalid {
                key: "store.firebase.database_url",
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind, self.server.port)
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "server.bind",
                reason: format!("{e}"),
            })
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            listen = %format!("{}:{}", self.server.bind, self.server.port),
            backend = ?self.store.backend,
            history_limit = self.store.history_limit,
            log_level = %self.logging.level,
            "hub configuration"
        );
    }
}
