//! Error types for gatelist
//!
//! This module defines the error hierarchy used throughout the engine.
//! We use `thiserror` for library-style errors that are part of the API;
//! infrastructure errors cross module boundaries as tagged values and the
//! command layer renders them for the actor. Business-rule rejections are
//! not errors at all — they live in [`crate::engine::Rejection`] and are
//! carried inside a successful outcome.

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence-layer errors
///
/// Driver failures are captured into `QueryFailed` at the executor boundary;
/// callers never see a raw `sqlx::Error` escape uncaught.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Query failed: {cause}")]
    QueryFailed { cause: String },

    #[error("Query timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Schema initialization failed: {0}")]
    Schema(String),

    #[error("Database is not available: {0}")]
    Unavailable(String),
}

impl DbError {
    /// Capture a driver error as a tagged failure
    pub fn query(err: sqlx::Error) -> Self {
        DbError::QueryFailed {
            cause: err.to_string(),
        }
    }
}

/// External name-resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("No account found for '{name}'")]
    NotFound { name: String },

    #[error("Resolution rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Resolution request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from resolution service: {0}")]
    InvalidResponse(String),

    #[error("Resolution timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Fallback when a rate-limited response carries no Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

impl ResolveError {
    /// Create an appropriate error from an HTTP status code, response body,
    /// and the Retry-After header value if the response carried one
    pub fn from_status(status: u16, name: &str, body: &str, retry_after: Option<u64>) -> Self {
        match status {
            404 | 204 => ResolveError::NotFound {
                name: name.to_string(),
            },
            // A 429-style response must map to RateLimited, never NotFound
            429 => ResolveError::RateLimited {
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            _ => ResolveError::InvalidResponse(if body.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {body}")
            }),
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for persistence operations
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Result type alias for external resolution
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_from_status() {
        assert!(matches!(
            ResolveError::from_status(404, "Stevie", "", None),
            ResolveError::NotFound { .. }
        ));

        // Mojang answers an unknown name with 204 No Content
        assert!(matches!(
            ResolveError::from_status(204, "Stevie", "", None),
            ResolveError::NotFound { .. }
        ));

        let err = ResolveError::from_status(500, "Stevie", "boom", None);
        assert!(matches!(err, ResolveError::InvalidResponse(_)));
    }

    #[test]
    fn test_retry_after_header_wins_over_default() {
        assert!(matches!(
            ResolveError::from_status(429, "Stevie", "", Some(120)),
            ResolveError::RateLimited { retry_after: 120 }
        ));
        assert!(matches!(
            ResolveError::from_status(429, "Stevie", "", None),
            ResolveError::RateLimited { retry_after: 60 }
        ));
    }

    #[test]
    fn test_db_error_display() {
        let err = DbError::Timeout { timeout_secs: 15 };
        assert!(err.to_string().contains("15 seconds"));
    }
}
