//! Async query executor
//!
//! Executes parameterized SQL against the pool with a fixed per-statement
//! timeout. Driver failures are captured into [`DbError::QueryFailed`] and
//! logged here; they never cross the boundary as raw exceptions. If the pool
//! is uninitialized or has been torn down, the executor transparently
//! (re)initializes it once and retries the original call exactly once; a
//! second failure is terminal for that call.

use crate::config::DatabaseConfig;
use crate::db::pool::build_pool;
use crate::db::schema::CREATE_TABLES;
use crate::error::{DbError, DbResult};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::{Any, AnyPool};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument, warn};

/// A positionally-bound statement parameter
///
/// Caller-supplied values are never concatenated into SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: &'q [SqlParam],
) -> Query<'q, Any, AnyArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.clone()),
            SqlParam::Int(i) => query.bind(*i),
        };
    }
    query
}

/// Whether a driver error means the pool itself is gone and worth rebuilding
fn is_connection_loss(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed
    )
}

/// Lifecycle-scoped database handle
///
/// Owns the pool explicitly; there is no process-wide singleton. Constructed
/// with [`Database::connect`], torn down with [`Database::close`].
pub struct Database {
    config: DatabaseConfig,
    pool: RwLock<Option<AnyPool>>,
    query_timeout: Duration,
}

impl Database {
    /// Open the pool and initialize the schema
    ///
    /// Schema initialization runs before the handle is returned; a failure
    /// here is fatal to the subsystem and surfaces as [`DbError::Schema`].
    pub async fn connect(config: DatabaseConfig) -> DbResult<Self> {
        let pool = build_pool(&config).await?;

        for ddl in CREATE_TABLES {
            sqlx::query(ddl)
                .execute(&pool)
                .await
                .map_err(|e| DbError::Schema(e.to_string()))?;
        }
        debug!("Schema initialized");

        let query_timeout = Duration::from_secs(config.query_timeout_secs);

        Ok(Self {
            config,
            pool: RwLock::new(Some(pool)),
            query_timeout,
        })
    }

    /// Tear down the pool
    ///
    /// A later call transparently reopens it (once) before executing.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
        }
    }

    /// Get the live pool, (re)initializing it if it was torn down
    async fn acquire_pool(&self) -> DbResult<AnyPool> {
        if let Some(pool) = self.pool.read().await.as_ref()
            && !pool.is_closed()
        {
            return Ok(pool.clone());
        }

        let mut slot = self.pool.write().await;
        // another caller may have raced us here
        if let Some(pool) = slot.as_ref()
            && !pool.is_closed()
        {
            return Ok(pool.clone());
        }

        warn!("Database pool uninitialized, reconnecting");
        let pool = build_pool(&self.config).await?;
        *slot = Some(pool.clone());
        Ok(pool)
    }

    async fn run_read(&self, pool: &AnyPool, sql: &str, params: &[SqlParam]) -> DbResult<Vec<AnyRow>> {
        let fut = bind_all(sqlx::query(sql), params).fetch_all(pool);
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => {
                if is_connection_loss(&e) {
                    Err(DbError::Unavailable(e.to_string()))
                } else {
                    Err(DbError::query(e))
                }
            }
            Err(_) => Err(DbError::Timeout {
                timeout_secs: self.query_timeout.as_secs(),
            }),
        }
    }

    async fn run_write(&self, pool: &AnyPool, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        let fut = bind_all(sqlx::query(sql), params).execute(pool);
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(Ok(result)) => Ok(result.rows_affected()),
            Ok(Err(e)) => {
                if is_connection_loss(&e) {
                    Err(DbError::Unavailable(e.to_string()))
                } else {
                    Err(DbError::query(e))
                }
            }
            Err(_) => Err(DbError::Timeout {
                timeout_secs: self.query_timeout.as_secs(),
            }),
        }
    }

    /// Execute a parameterized read, returning all rows
    #[instrument(skip(self, params), fields(sql = %sql))]
    pub async fn fetch_all(&self, sql: &str, params: &[SqlParam]) -> DbResult<Vec<AnyRow>> {
        let pool = self.acquire_pool().await?;
        match self.run_read(&pool, sql, params).await {
            Err(DbError::Unavailable(cause)) => {
                // the pool died under us; rebuild once and retry once
                warn!(%cause, "Connection lost, retrying read once");
                self.pool.write().await.take();
                let pool = self.acquire_pool().await?;
                self.run_read(&pool, sql, params)
                    .await
                    .inspect_err(|e| error!(error = %e, "Read failed after reconnect"))
            }
            Err(e) => {
                error!(error = %e, "Read failed");
                Err(e)
            }
            ok => ok,
        }
    }

    /// Execute a parameterized read, returning at most one row
    pub async fn fetch_optional(&self, sql: &str, params: &[SqlParam]) -> DbResult<Option<AnyRow>> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    /// Execute a parameterized write, returning the affected-row count
    #[instrument(skip(self, params), fields(sql = %sql))]
    pub async fn execute(&self, sql: &str, params: &[SqlParam]) -> DbResult<u64> {
        let pool = self.acquire_pool().await?;
        match self.run_write(&pool, sql, params).await {
            Err(DbError::Unavailable(cause)) => {
                warn!(%cause, "Connection lost, retrying write once");
                self.pool.write().await.take();
                let pool = self.acquire_pool().await?;
                self.run_write(&pool, sql, params)
                    .await
                    .inspect_err(|e| error!(error = %e, "Write failed after reconnect"))
            }
            Err(e) => {
                error!(error = %e, "Write failed");
                Err(e)
            }
            ok => ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_param_from() {
        assert_eq!(SqlParam::from("ip"), SqlParam::Text("ip".to_string()));
        assert_eq!(SqlParam::from(42i64), SqlParam::Int(42));
    }

    #[test]
    fn test_connection_loss_classification() {
        assert!(is_connection_loss(&sqlx::Error::PoolClosed));
        assert!(!is_connection_loss(&sqlx::Error::RowNotFound));
    }
}
