//! Database connection and pool management.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use shelf_config::DatabaseConfig;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::time::Duration;
use tracing::instrument;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Database connection pool for the library store.
///
/// Owns the SQLite connection pool. Repositories borrow a clone of the pool;
/// the database itself is only needed again to [`close`](Self::close) it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn new(options: SqliteConnectOptions, pool_options: SqlitePoolOptions) -> Result<Self> {
        let pool = pool_options
            // Apply the query-based PRAGMAs to EVERY connection the pool opens,
            // not just the first one.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Connect to the database described by `config`.
    ///
    /// Creates the database file (and its parent directory) if it doesn't
    /// exist, then runs migrations.
    #[instrument(level = "debug", skip(config), fields(path))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let path = config.resolve_path().or_raise(|| ErrorKind::Config)?;
        tracing::Span::current().record("path", tracing::field::display(path.display()));
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
        }
        let options = Self::base_options(config.busy_timeout()).filename(&path).create_if_missing(true);
        let pool_options = SqlitePoolOptions::new().max_connections(config.max_connections);
        Self::new(options, pool_options).await
    }

    /// Connect to an in-memory database (useful for testing).
    ///
    /// Note:
    /// - In-memory databases are destroyed when the connection closes.
    /// - Do NOT apply `#[cfg(test)]` so that other crates can also use this in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options(DatabaseConfig::default().busy_timeout()).filename(":memory:");
        // Every connection to ":memory:" is its own database, so the pool is
        // pinned to exactly one connection that is never retired.
        let pool_options = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        Self::new(options, pool_options).await
    }

    /// Base connection options shared between file and in-memory databases.
    fn base_options(busy_timeout: Duration) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // WAL lets readers keep a consistent snapshot while a write is
            // in flight, so queries never see half-applied mutations.
            .journal_mode(SqliteJournalMode::Wal)
            // Associations must point at existing records.
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Writers are serialized by SQLite; waiting writers queue here.
            .busy_timeout(busy_timeout)
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA wal_autocheckpoint = 1000;
                PRAGMA cache_size = -4096;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Run database migrations.
    ///
    /// This is called automatically by `connect` and `connect_in_memory`.
    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    ///
    /// Waits for all connections to be returned to the pool and then closes
    /// them. The Database instance should not be used afterwards.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
