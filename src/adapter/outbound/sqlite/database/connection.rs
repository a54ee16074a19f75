//! Database connection management using Diesel ORM.
//!
//! Provides connection pooling, migration support, and connection
//! configuration for SQLite databases.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{Error, Result, StoreError};

/// Embedded database migrations compiled from the migrations/ directory.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Type alias for a SQLite connection pool.
pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct Pragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for Pragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        configure_sqlite_connection(conn).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Create a connection pool for the given database URL.
///
/// # Errors
/// Returns an error if the pool cannot be created.
pub fn create_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    Pool::builder()
        .max_size(5)
        .connection_customizer(Box::new(Pragmas))
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))
}

/// Run all pending database migrations.
///
/// # Errors
/// Returns an error if migrations fail.
pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let mut conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Database(e.to_string()))?;
    Ok(())
}

/// Open a pool and bring the schema up to date.
///
/// # Errors
/// Returns an error if the database cannot be opened or migrated.
pub fn open(database_url: &str) -> Result<DbPool> {
    let pool = create_pool(database_url)?;
    run_migrations(&pool)?;
    Ok(pool)
}

/// Configure SQLite connection pragmas for concurrent writers.
///
/// # Errors
/// Returns an error if a pragma fails to apply.
pub fn configure_sqlite_connection(
    conn: &mut SqliteConnection,
) -> std::result::Result<(), diesel::result::Error> {
    diesel::sql_query("PRAGMA busy_timeout=5000").execute(conn)?;
    diesel::sql_query("PRAGMA foreign_keys=ON").execute(conn)?;
    Ok(())
}

/// Check out a connection for a store operation.
pub(crate) fn checkout(pool: &DbPool) -> std::result::Result<DbConnection, StoreError> {
    pool.get().map_err(|e| StoreError::Backend(e.to_string()))
}
