//! Catalog database: connection bootstrap, schema and storage errors.
//!
//! # Responsibility
//! - Open SQLite connections that hold the record store and search index.
//! - Bring their schema up to date before any record or index row is touched.
//!
//! # Invariants
//! - The schema version is tracked via `PRAGMA user_version`.
//! - A database written by a newer binary is never modified.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use migrations::{catalog_tables, latest_version, schema_version, MigrationReport};
pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was migrated by a newer catalog version.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A schema step ran but did not leave the tables it owns.
    IncompleteMigration {
        version: u32,
        name: &'static str,
        missing: Vec<String>,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "catalog database error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "catalog schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::IncompleteMigration {
                version,
                name,
                missing,
            } => write!(
                f,
                "catalog schema step {version} ({name}) left tables missing: {}",
                missing.join(", ")
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
