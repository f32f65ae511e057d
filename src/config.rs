//! Application configuration and environment variable parsing.
//!
//! Settings are read from the environment (optionally seeded from a `.env` file).
//! Every field has a default, so an empty environment yields a working service that
//! keeps its archive under `public/repoData.json` relative to the working directory.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration as StdDuration;

/// Output format of the tracing subscriber.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Port the HTTP server binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Location of the JSON archive every fetched record is appended to.
    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,

    /// Directory served as static files; the archive is readable from here as
    /// `/repoData.json` when it lives inside it.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Base URL of the GitHub REST API.
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,

    /// Time to live for cached repository records in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,

    /// Maximum number of entries to keep in the record cache.
    #[serde(default = "default_cache_max_capacity")]
    pub cache_max_capacity: u64,

    /// Maximum number of concurrent upstream fetches when listing every stored repository.
    #[serde(default = "default_fetch_concurrency_limit")]
    pub fetch_concurrency_limit: usize,

    /// Serialize archive writes behind a single lock.
    ///
    /// Off by default: concurrent saves then race and one of them may be lost.
    #[serde(default)]
    pub archive_serialize_writes: bool,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_port() -> u16 {
    3000
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("public/repoData.json")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_max_capacity() -> u64 {
    1000
}

fn default_fetch_concurrency_limit() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            archive_path: default_archive_path(),
            static_dir: default_static_dir(),
            github_api_url: default_github_api_url(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
            cache_max_capacity: default_cache_max_capacity(),
            fetch_concurrency_limit: default_fetch_concurrency_limit(),
            archive_serialize_writes: false,
            log_format: LogFormat::Text,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn cache_ttl(&self) -> StdDuration {
        StdDuration::from_secs(self.cache_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 9] = [
        "PORT",
        "ARCHIVE_PATH",
        "STATIC_DIR",
        "GITHUB_API_URL",
        "CACHE_TTL_SECONDS",
        "CACHE_MAX_CAPACITY",
        "FETCH_CONCURRENCY_LIMIT",
        "ARCHIVE_SERIALIZE_WRITES",
        "LOG_FORMAT",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_vars();
        env::set_var("PORT", "8080");
        env::set_var("ARCHIVE_PATH", "/tmp/archive.json");
        env::set_var("GITHUB_API_URL", "http://localhost:9999");
        env::set_var("CACHE_TTL_SECONDS", "3600");
        env::set_var("CACHE_MAX_CAPACITY", "500");
        env::set_var("FETCH_CONCURRENCY_LIMIT", "5");
        env::set_var("ARCHIVE_SERIALIZE_WRITES", "true");
        env::set_var("LOG_FORMAT", "json");

        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.port, 8080);
        assert_eq!(config.archive_path, PathBuf::from("/tmp/archive.json"));
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.github_api_url, "http://localhost:9999");
        assert_eq!(config.cache_ttl(), StdDuration::from_secs(3600));
        assert_eq!(config.cache_max_capacity, 500);
        assert_eq!(config.fetch_concurrency_limit, 5);
        assert!(config.archive_serialize_writes);
        assert_eq!(config.log_format, LogFormat::Json);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_vars();
        let config = AppConfig::from_env().expect("Failed to load config");

        assert_eq!(config.port, 3000);
        assert_eq!(config.archive_path, PathBuf::from("public/repoData.json"));
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert!(!config.archive_serialize_writes);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    #[serial]
    fn test_config_invalid_value() {
        clear_vars();
        env::set_var("PORT", "not-a-port");
        let result = AppConfig::from_env();
        assert!(result.is_err());
        clear_vars();
    }
}
