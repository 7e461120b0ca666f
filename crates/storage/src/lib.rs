//! Persistence layer for the Fermata trust & moderation subsystem
//!
//! This crate owns SQLite access (pooled connections, WAL tuning, versioned
//! migrations) and the subsystem schema: accounts, conduct history, reports,
//! social-graph edges, and notifications. Services in the other crates share
//! a [`sqlx::SqlitePool`] obtained from here; the datastore is the only
//! coordination point between request handlers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod error;
pub mod schema;

pub use database::{
    DatabaseConfig, DatabaseError, MigrationDefinition, SqliteDatabase, SynchronousMode,
};
pub use error::ErrorKind;

/// Open a database at the configured path and bring the schema up to date.
pub async fn open(config: DatabaseConfig) -> database::Result<SqliteDatabase> {
    let db = SqliteDatabase::new(config).await?;
    db.migrate(&schema::migrations()).await?;
    Ok(db)
}

/// Open a fully migrated in-memory database (for testing).
pub async fn open_in_memory() -> database::Result<SqliteDatabase> {
    let db = SqliteDatabase::in_memory().await?;
    db.migrate(&schema::migrations()).await?;
    Ok(db)
}
