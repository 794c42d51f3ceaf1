//! Command-line interface definitions.
//!
//! This module defines the CLI structure for the server binary using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::config::ServerConfig;

/// Static file server with a timed in-memory file cache.
#[derive(Parser, Debug)]
#[command(name = "static-cache-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Without one, built-in defaults are used.
    pub config: Option<PathBuf>,

    /// Listen on this port instead of the configured one.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve this directory instead of the configured one.
    #[arg(long, value_name = "DIR")]
    pub content_dir: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.listening_port = port;
        }
        if let Some(dir) = &self.content_dir {
            config.content_directory = dir.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_path() {
        let cli = Cli::parse_from(["test", "server.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("server.toml")));
        assert!(cli.port.is_none());
    }

    #[test]
    fn test_parse_without_arguments() {
        let cli = Cli::parse_from(["test"]);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::parse_from(["test", "-p", "8080", "--content-dir", "/srv/www"]);
        let config = cli.apply_overrides(ServerConfig::default());
        assert_eq!(config.listening_port, 8080);
        assert_eq!(config.content_directory, PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let cli = Cli::parse_from(["test", "server.toml"]);
        let config = cli.apply_overrides(ServerConfig::default());
        assert_eq!(config, ServerConfig::default());
    }
}
