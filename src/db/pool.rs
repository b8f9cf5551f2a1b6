//! Backend-specific pool construction
//!
//! The embedded SQLite backend is a single-writer file database and gets a
//! pool of exactly one connection; the networked MariaDB backend gets a pool
//! sized from configuration (max, min idle, acquire timeout).

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::error::{DbError, DbResult};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::sync::Once;
use std::time::Duration;
use tracing::info;

static INSTALL_DRIVERS: Once = Once::new();

/// Build the connection URL for the configured backend
fn connection_url(config: &DatabaseConfig) -> String {
    match config.backend {
        // mode=rwc creates the file on first open
        DatabaseBackend::Sqlite => format!("sqlite://{}?mode=rwc", config.path),
        DatabaseBackend::Mariadb => {
            let m = &config.mariadb;
            let auth = match &m.password {
                Some(password) => format!("{}:{}", m.username, password),
                None => m.username.clone(),
            };
            format!("mysql://{}@{}:{}/{}", auth, m.host, m.port, m.database)
        }
    }
}

/// Construct a pool for the configured backend
pub(crate) async fn build_pool(config: &DatabaseConfig) -> DbResult<AnyPool> {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

    let url = connection_url(config);

    let options = match config.backend {
        DatabaseBackend::Sqlite => AnyPoolOptions::new().max_connections(1),
        DatabaseBackend::Mariadb => AnyPoolOptions::new()
            .max_connections(config.mariadb.max_connections)
            .min_connections(config.mariadb.min_connections)
            .acquire_timeout(Duration::from_secs(config.mariadb.acquire_timeout_secs)),
    };

    let pool = options
        .connect(&url)
        .await
        .map_err(|e| DbError::Unavailable(e.to_string()))?;

    info!(backend = ?config.backend, "Database pool ready");

    Ok(pool)
}
