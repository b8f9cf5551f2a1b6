//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (GATELIST_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &["gatelist.toml", ".gatelist.toml", "/etc/gatelist/config.toml"];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Defaults are handled by serde defaults on AppConfig

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {path}"
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with GATELIST_ prefix
    // e.g., GATELIST_DATABASE__BACKEND, GATELIST_RESOLVER__TIMEOUT_SECS
    // Double underscore (__) maps to nested keys (database.backend)
    builder = builder.add_source(
        Environment::with_prefix("GATELIST")
            .separator("__")
            .try_parsing(true),
    );

    // Build and deserialize
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    // Validate resolver URL
    if config.resolver.profile_api_url.is_empty() {
        return Err(ConfigError::Missing {
            field: "resolver.profile_api_url".to_string(),
        });
    }

    if !config.resolver.profile_api_url.starts_with("http://")
        && !config.resolver.profile_api_url.starts_with("https://")
    {
        return Err(ConfigError::Invalid {
            message: format!(
                "resolver.profile_api_url must start with http:// or https://, got: {}",
                config.resolver.profile_api_url
            ),
        });
    }

    if config.resolver.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "resolver.timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.database.query_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            message: "database.query_timeout_secs must be greater than 0".to_string(),
        });
    }

    if config.database.mariadb.max_connections == 0 {
        return Err(ConfigError::Invalid {
            message: "database.mariadb.max_connections must be greater than 0".to_string(),
        });
    }

    // A secondary resolver needs both a prefix and an endpoint
    if config.resolver.secondary.enabled {
        if config.resolver.secondary.prefix.is_none() {
            return Err(ConfigError::Missing {
                field: "resolver.secondary.prefix".to_string(),
            });
        }
        if config.resolver.secondary.api_url.is_none() {
            return Err(ConfigError::Missing {
                field: "resolver.secondary.api_url".to_string(),
            });
        }
    }

    Ok(())
}
