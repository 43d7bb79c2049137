//! Catalog schema migrations.
//!
//! # Responsibility
//! - Register the record store and search index schemas in order.
//! - Apply pending steps in one transaction and check the tables they own.
//!
//! # Invariants
//! - Step versions are strictly increasing.
//! - The applied version is mirrored to `PRAGMA user_version`.
//! - A step only counts as applied once every table it owns exists.
//!
//! # See also
//! - `0001_init.sql` for the record store, `0002_search.sql` for the index.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
    /// Tables the step creates.
    tables: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "record_store",
        sql: include_str!("0001_init.sql"),
        tables: &["records"],
    },
    Migration {
        version: 2,
        name: "search_index",
        sql: include_str!("0002_search.sql"),
        tables: &["index_mappings", "search_fts", "search_raw"],
    },
];

/// Steps applied by one [`apply_migrations`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from: u32,
    pub to: u32,
    pub applied: Vec<&'static str>,
}

/// Latest schema version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Every table the catalog schema owns.
pub fn catalog_tables() -> impl Iterator<Item = &'static str> {
    MIGRATIONS
        .iter()
        .flat_map(|migration| migration.tables.iter().copied())
}

pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings the catalog schema up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    apply(conn, MIGRATIONS)
}

fn apply(conn: &mut Connection, migrations: &[Migration]) -> DbResult<MigrationReport> {
    let from = schema_version(conn)?;
    let latest = migrations.last().map_or(0, |migration| migration.version);

    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let mut report = MigrationReport {
        from,
        to: from,
        applied: Vec::new(),
    };
    if from == latest {
        debug!("event=db_migrate module=db status=skip version={from}");
        return Ok(report);
    }

    let tx = conn.transaction()?;
    for migration in migrations.iter().filter(|migration| migration.version > from) {
        tx.execute_batch(migration.sql)?;
        let missing = missing_tables(&tx, migration.tables)?;
        if !missing.is_empty() {
            return Err(DbError::IncompleteMigration {
                version: migration.version,
                name: migration.name,
                missing,
            });
        }
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        debug!(
            "event=db_migrate module=db status=step version={} name={}",
            migration.version, migration.name
        );
        report.to = migration.version;
        report.applied.push(migration.name);
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from={} to={} steps={}",
        report.from,
        report.to,
        report.applied.join(",")
    );
    Ok(report)
}

fn missing_tables(tx: &Transaction<'_>, tables: &[&str]) -> DbResult<Vec<String>> {
    let mut stmt =
        tx.prepare("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);")?;
    let mut missing = Vec::new();
    for table in tables {
        let exists: bool = stmt.query_row([table], |row| row.get(0))?;
        if !exists {
            missing.push(table.to_string());
        }
    }
    Ok(missing)
}

#[cfg(test)]
mod tests {
    use super::{apply, apply_migrations, catalog_tables, schema_version, Migration};
    use crate::db::DbError;
    use rusqlite::Connection;

    #[test]
    fn fresh_database_runs_every_step_once() {
        let mut conn = Connection::open_in_memory().unwrap();

        let report = apply_migrations(&mut conn).unwrap();
        assert_eq!(report.from, 0);
        assert_eq!(report.applied, vec!["record_store", "search_index"]);
        assert_eq!(schema_version(&conn).unwrap(), report.to);

        let again = apply_migrations(&mut conn).unwrap();
        assert!(again.applied.is_empty());
        assert_eq!(again.from, report.to);
    }

    #[test]
    fn catalog_tables_cover_records_and_index() {
        let tables: Vec<&str> = catalog_tables().collect();
        assert_eq!(tables, vec!["records", "index_mappings", "search_fts", "search_raw"]);
    }

    #[test]
    fn step_without_its_tables_rolls_back() {
        let mut conn = Connection::open_in_memory().unwrap();
        let broken = [Migration {
            version: 1,
            name: "holdings",
            sql: "CREATE TABLE holding_items (id TEXT PRIMARY KEY);",
            tables: &["holding_items", "holding_locations"],
        }];

        let err = apply(&mut conn, &broken).unwrap_err();
        assert!(matches!(
            &err,
            DbError::IncompleteMigration { version: 1, name: "holdings", missing }
                if missing == &vec!["holding_locations".to_string()]
        ));
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }
}
