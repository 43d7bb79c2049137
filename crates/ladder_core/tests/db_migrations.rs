use ladder_core::db::{
    catalog_tables, latest_version, open_db, open_db_in_memory, schema_version, DbError,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_creates_store_and_index() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    for table in catalog_tables() {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ladder.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "records");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 999);
    let tables: i64 = conn
        .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn live_fingerprints_are_unique_per_model() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO records
        (uuid, namespace, model, fingerprint, document, created_at, updated_at, is_deleted)
        VALUES (?1, 'Ltest', 'Resource', ?2, '{}', 1, 1, ?3);";

    conn.execute(insert, rusqlite::params!["a", "f1", 0]).unwrap();
    assert!(conn.execute(insert, rusqlite::params!["b", "f1", 0]).is_err());
    conn.execute(insert, rusqlite::params!["c", "f1", 1]).unwrap();
    conn.execute(insert, rusqlite::params!["d", Option::<String>::None, 0])
        .unwrap();
    conn.execute(insert, rusqlite::params!["e", Option::<String>::None, 0])
        .unwrap();
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
