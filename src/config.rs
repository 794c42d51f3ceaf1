//! Configuration for the file cache and the server.
//!
//! [`CacheConfig`] is built in code with a builder. [`ServerConfig`] is loaded
//! once at startup from a TOML file with a `[server]` table:
//!
//! ```toml
//! [server]
//! listening_port = 8080
//! content_directory = "./content"
//! cache_ttl = 3600
//! certificate = ""
//! certificate_key = ""
//! log_path = "logs/requests.log"
//! request_timeout = 5
//! ```
//!
//! Every key is optional.

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

/// Default entry lifetime: one hour.
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default time a client gets to send its request head.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Configuration for creating a new cache instance.
///
/// ```
/// use static_cache_server::CacheConfig;
/// use std::time::Duration;
///
/// let config = CacheConfig::new().ttl(Duration::from_secs(300)).build();
/// assert_eq!(config.get_ttl(), Duration::from_secs(300));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry lives after insertion.
    pub(crate) ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry lifetime. `Duration::ZERO` expires entries immediately.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the entry lifetime in whole seconds; negative values clamp to zero.
    pub fn ttl_secs(self, secs: i64) -> Self {
        self.ttl(ttl_from_secs(secs))
    }

    pub fn build(self) -> Self {
        self
    }

    pub fn get_ttl(&self) -> Duration {
        self.ttl
    }
}

/// Convert a configured TTL in seconds, treating negatives as "expire now".
pub fn ttl_from_secs(secs: i64) -> Duration {
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
}

/// Server settings, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to listen on.
    pub listening_port: u16,

    /// Directory whose regular files are served.
    pub content_directory: PathBuf,

    /// Cache entry lifetime in seconds.
    pub cache_ttl: i64,

    /// TLS certificate (PEM path). Empty disables TLS.
    pub certificate: String,

    /// TLS private key (PEM path). Empty disables TLS.
    pub certificate_key: String,

    /// Request log destination. Empty logs to the console.
    pub log_path: String,

    /// Seconds a client has to send a complete request head.
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listening_port: 80,
            content_directory: PathBuf::from("./content"),
            cache_ttl: DEFAULT_TTL_SECS as i64,
            certificate: String::new(),
            certificate_key: String::new(),
            log_path: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Load settings from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(file.server)
    }

    /// Cache settings derived from this configuration.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new().ttl_secs(self.cache_ttl).build()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Whether both TLS certificate and key were provided.
    pub fn tls_configured(&self) -> bool {
        !self.certificate.is_empty() && !self.certificate_key.is_empty()
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Server Configuration:")?;
        writeln!(f, "  Port: {}", self.listening_port)?;
        writeln!(f, "  Content Directory: {}", self.content_directory.display())?;
        writeln!(f, "  Cache TTL: {} seconds", self.cache_ttl)?;
        writeln!(f, "  Certificate: {}", self.certificate)?;
        writeln!(f, "  Certificate Key: {}", self.certificate_key)?;
        writeln!(f, "  Log Path: {}", self.log_path)?;
        write!(f, "  Request Timeout: {} seconds", self.request_timeout)
    }
}
