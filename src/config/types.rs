//! Configuration types for gatelist
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Database backend settings
    pub database: DatabaseConfig,

    /// External profile-resolution settings
    pub resolver: ResolverConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Embedded single-writer file database
    #[default]
    Sqlite,
    /// Networked MariaDB/MySQL server
    Mariadb,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Which backend to connect to
    pub backend: DatabaseBackend,

    /// Path of the SQLite database file (sqlite backend only)
    pub path: String,

    /// MariaDB connection settings (mariadb backend only)
    pub mariadb: MariaDbConfig,

    /// Per-statement timeout in seconds
    pub query_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            path: "gatelist.db".to_string(),
            mariadb: MariaDbConfig::default(),
            query_timeout_secs: 15,
        }
    }
}

/// MariaDB connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MariaDbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    /// Prefer env var GATELIST_DATABASE__MARIADB__PASSWORD
    pub password: Option<String>,

    /// Maximum pool size
    pub max_connections: u32,

    /// Minimum idle connections kept open
    pub min_connections: u32,

    /// Connection-acquire timeout in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for MariaDbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            database: "gatelist".to_string(),
            username: "gatelist".to_string(),
            password: None,
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 10,
        }
    }
}

/// External profile-resolution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Base URL of the name→stable-id lookup service
    pub profile_api_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Secondary-platform resolver settings
    pub secondary: SecondaryPlatformConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            profile_api_url: "https://api.mojang.com".to_string(),
            timeout_secs: 10,
            secondary: SecondaryPlatformConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Endpoint for resolving a profile by name
    pub fn profile_endpoint(&self, name: &str) -> String {
        format!(
            "{}/users/profiles/minecraft/{}",
            self.profile_api_url.trim_end_matches('/'),
            name
        )
    }
}

/// Secondary-platform (prefixed-name) resolver configuration
///
/// Identifiers carrying `prefix` belong to an alternate client ecosystem and
/// are resolved through a dedicated service instead of the primary one.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecondaryPlatformConfig {
    /// Enable the secondary resolver
    pub enabled: bool,

    /// Name prefix identifying secondary-platform players (e.g. ".")
    pub prefix: Option<String>,

    /// Base URL of the secondary lookup service
    pub api_url: Option<String>,
}

impl Default for SecondaryPlatformConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: None,
            api_url: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.query_timeout_secs, 15);
        assert_eq!(config.resolver.profile_api_url, "https://api.mojang.com");
        assert!(!config.resolver.secondary.enabled);
    }

    #[test]
    fn test_profile_endpoint() {
        let config = ResolverConfig {
            profile_api_url: "https://api.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.profile_endpoint("Stevie"),
            "https://api.example.com/users/profiles/minecraft/Stevie"
        );
    }

    #[test]
    fn test_deserialize_backend() {
        let backend: DatabaseBackend = serde_json::from_str(r#""sqlite""#).unwrap();
        assert_eq!(backend, DatabaseBackend::Sqlite);

        let backend: DatabaseBackend = serde_json::from_str(r#""mariadb""#).unwrap();
        assert_eq!(backend, DatabaseBackend::Mariadb);
    }
}
