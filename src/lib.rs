//! # Static Cache Server
//!
//! A static-file HTTP server with a timer-driven in-memory file cache and an
//! asynchronous request logger.
//!
//! ## Features
//!
//! - **Timer-driven TTL**: every cached file is removed by a one-shot timer
//!   one TTL after it was inserted; reads never extend its life
//! - **No silent overwrite**: inserting a path that is already cached fails
//!   and leaves the cached copy alone
//! - **Pluggable timers**: a dedicated timer thread, tokio tasks, or a manual
//!   clock for tests
//! - **Async request log**: producers never wait on log I/O
//!
//! ## Quick Start
//!
//! ```rust
//! use static_cache_server::{CacheConfig, FileCache};
//! use std::time::Duration;
//!
//! let cache = FileCache::new(CacheConfig::new().ttl(Duration::from_secs(300)).build());
//!
//! if cache.lookup("content/index.html").is_none() {
//!     let bytes = b"<h1>hi</h1>".to_vec(); // read from disk
//!     cache.insert("content/index.html", bytes);
//! }
//! assert!(cache.contains("content/index.html"));
//! ```
//!
//! ## Thread Safety
//!
//! Cloning a `FileCache` creates a new handle to the same entries:
//!
//! ```rust
//! use static_cache_server::FileCache;
//! use std::thread;
//!
//! let cache = FileCache::default();
//!
//! let handles: Vec<_> = (0..4).map(|i| {
//!     let cache = cache.clone();
//!     thread::spawn(move || {
//!         cache.insert(format!("file_{}.txt", i), format!("contents {}", i));
//!     })
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(cache.len(), 4);
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod logger;
pub mod stats;
pub mod timer;

pub use cache::FileCache;
pub use config::{CacheConfig, ServerConfig};
pub use entry::CacheKey;
pub use error::{CacheError, CacheResult, ConfigError, LoggerError, ServerError, ServerResult};
pub use logger::{LogSink, RequestLogger};
pub use stats::{CacheStats, StatsSnapshot};

pub(crate) mod entry;
pub(crate) mod storage;

pub mod cli;
pub mod http;
pub mod listing;
pub mod logging;
pub mod server;

pub use cli::Cli;
pub use server::Server;
