//! # SQLite persistence
//!
//! Maps the relational model onto the domain models. One `SqliteStore`
//! implements both `ContentStore` and `ModerationStore`; every mutating call
//! runs inside its own transaction, so a failed call leaves no partial rows.

mod content;
mod moderation;
mod rows;

use std::str::FromStr;

use domains::{DomainError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url`, e.g. `sqlite://boardsmith.db`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage_err)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(storage_err)?;
        Ok(Self { pool })
    }

    /// A migrated private database living on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(storage_err)?
            .foreign_keys(true);
        // The database lives as long as its only connection does.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(storage_err)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Storage(format!("migration failed: {e}")))?;
        tracing::debug!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps driver errors onto domain errors. Constraint details stay in the
/// `Storage` message, which is never shown to visitors.
pub(crate) fn storage_err(err: sqlx::Error) -> DomainError {
    match &err {
        sqlx::Error::RowNotFound => DomainError::NotFound("row", String::new()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            tracing::debug!(error = %db, "unique constraint violated");
            DomainError::Conflict("That entry already exists".into())
        }
        _ => {
            tracing::error!(error = %err, "database error");
            DomainError::Storage(err.to_string())
        }
    }
}
