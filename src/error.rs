//! Error types for the cache, the request logger and the server glue.
//!
//! The cache and logger errors are expected, locally recovered conditions:
//! a duplicate insert means "already cached", and an unavailable log sink
//! costs one line. Only configuration and socket errors end the process.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::entry::CacheKey;

/// Errors reported by the file cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The key is already cached; the existing entry was left untouched.
    #[error("key already cached: '{0}'")]
    DuplicateKey(CacheKey),
}

/// A specialized Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors reported by the request logger's background writer.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// The log destination could not be opened or written.
    #[error("log sink unavailable ({sink}): {source}")]
    SinkUnavailable {
        sink: String,
        #[source]
        source: io::Error,
    },
}

/// Errors raised while loading the server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that stop the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;
