//! Centralized configuration for Undertow.
//!
//! All tunable parameters live here so the server, the content sources and
//! the reaper agree on one set of values.

use std::path::PathBuf;
use std::time::Duration;

use crate::streaming::DEFAULT_CHUNK_SIZE;

/// Central configuration for all Undertow components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct UndertowConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub streaming: StreamingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// TCP port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Renders `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Storage root and eviction cadence.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per bundle
    pub root: PathBuf,
    /// Time between reaper cycles
    pub reap_interval: Duration,
    /// How often the directory source checks whether a bundle has appeared
    pub poll_interval: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./downloads"),
            reap_interval: Duration::from_secs(3 * 60 * 60), // 3 hours
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Per-request streaming behavior.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Read buffer size per session
    pub chunk_size: usize,
    /// Longest a request waits for bundle metadata
    pub metadata_timeout: Duration,
    /// Chunks buffered between a session and its response body
    pub channel_capacity: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            metadata_timeout: Duration::from_secs(120),
            channel_capacity: 1,
        }
    }
}

impl UndertowConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("UNDERTOW_HOST")
            && !host.is_empty()
        {
            config.server.host = host;
        }

        if let Some(port) = env_parse::<u16>("UNDERTOW_PORT") {
            config.server.port = port;
        }

        if let Ok(dir) = std::env::var("UNDERTOW_STORAGE_DIR")
            && !dir.is_empty()
        {
            config.storage.root = PathBuf::from(dir);
        }

        if let Some(seconds) = env_parse::<u64>("UNDERTOW_REAP_INTERVAL_SECS") {
            config.storage.reap_interval = Duration::from_secs(seconds);
        }

        if let Some(seconds) = env_parse::<u64>("UNDERTOW_METADATA_TIMEOUT_SECS") {
            config.streaming.metadata_timeout = Duration::from_secs(seconds);
        }

        if let Some(size) = env_parse::<usize>("UNDERTOW_CHUNK_SIZE")
            && size > 0
        {
            config.streaming.chunk_size = size;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            storage: StorageConfig {
                root: std::env::temp_dir().join("undertow-test-downloads"),
                reap_interval: Duration::from_millis(100),
                poll_interval: Duration::from_millis(10),
            },
            streaming: StreamingConfig {
                chunk_size: 4096,
                metadata_timeout: Duration::from_millis(200),
                channel_capacity: 1,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = UndertowConfig::default();

        assert_eq!(config.server.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.storage.root, PathBuf::from("./downloads"));
        assert_eq!(config.storage.reap_interval, Duration::from_secs(10_800));
        assert_eq!(config.streaming.chunk_size, 1024 * 1024);
        assert_eq!(config.streaming.metadata_timeout, Duration::from_secs(120));
        assert_eq!(config.streaming.channel_capacity, 1);
    }

    #[test]
    fn test_testing_preset_is_fast() {
        let config = UndertowConfig::for_testing();
        assert!(config.streaming.metadata_timeout < Duration::from_secs(1));
        assert!(config.storage.poll_interval < Duration::from_secs(1));
        assert_eq!(config.server.port, 0);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("UNDERTOW_HOST", "127.0.0.1");
            std::env::set_var("UNDERTOW_PORT", "8080");
            std::env::set_var("UNDERTOW_STORAGE_DIR", "/srv/media");
            std::env::set_var("UNDERTOW_REAP_INTERVAL_SECS", "60");
            std::env::set_var("UNDERTOW_METADATA_TIMEOUT_SECS", "not-a-number");
            std::env::set_var("UNDERTOW_CHUNK_SIZE", "65536");
        }

        let config = UndertowConfig::from_env();

        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.storage.root, PathBuf::from("/srv/media"));
        assert_eq!(config.storage.reap_interval, Duration::from_secs(60));
        // Garbage keeps the default
        assert_eq!(config.streaming.metadata_timeout, Duration::from_secs(120));
        assert_eq!(config.streaming.chunk_size, 65536);

        // Cleanup
        unsafe {
            std::env::remove_var("UNDERTOW_HOST");
            std::env::remove_var("UNDERTOW_PORT");
            std::env::remove_var("UNDERTOW_STORAGE_DIR");
            std::env::remove_var("UNDERTOW_REAP_INTERVAL_SECS");
            std::env::remove_var("UNDERTOW_METADATA_TIMEOUT_SECS");
            std::env::remove_var("UNDERTOW_CHUNK_SIZE");
        }
    }
}
