//! Record repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist records in document form together with their fingerprint.
//! - Look records up by id and by `(model, fingerprint)`.
//!
//! # Invariants
//! - Write paths call `Record::validate()` before SQL mutations.
//! - Two live records of one model never share a fingerprint; the store's
//!   unique index reports the conflict as `DuplicateFingerprint`.
//! - Records whose canonical form is empty store no fingerprint.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::descriptor::ModelKey;
use crate::model::record::{Record, RecordId, RecordValidationError, Timestamps};
use crate::normalize::{IdPolicy, Normalizable};
use log::{error, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, Row};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const RECORD_SELECT_SQL: &str = "SELECT
    uuid,
    namespace,
    model,
    fingerprint,
    document,
    created_at,
    updated_at,
    deleted_at,
    is_deleted
FROM records";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Db(DbError),
    NotFound(RecordId),
    /// A live record of the same model already has this fingerprint.
    DuplicateFingerprint { model: ModelKey, fingerprint: String },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::DuplicateFingerprint { model, fingerprint } => {
                write!(f, "duplicate content for {model}: fingerprint {fingerprint}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::DuplicateFingerprint { .. } | Self::InvalidData(_) => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One persisted row: the document plus store-level columns.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub model: ModelKey,
    pub fingerprint: Option<String>,
    pub document: Value,
    pub timestamps: Timestamps,
    pub is_deleted: bool,
}

/// Query options for listing records.
#[derive(Debug, Clone, Default)]
pub struct RecordListQuery {
    pub model: Option<ModelKey>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for catalog records.
pub trait RecordRepository {
    fn create_record(&self, record: &Record) -> RepoResult<RecordId>;
    fn update_record(&self, record: &Record) -> RepoResult<()>;
    fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<StoredRecord>>;
    /// Live record of `model` with the given fingerprint.
    fn find_by_fingerprint(
        &self,
        model: &ModelKey,
        fingerprint: &str,
    ) -> RepoResult<Option<StoredRecord>>;
    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<StoredRecord>>;
    fn soft_delete_record(&self, id: RecordId, deleted_at: i64) -> RepoResult<()>;
}

/// SQLite-backed record repository.
pub struct SqliteRecordRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl RecordRepository for SqliteRecordRepository<'_> {
    fn create_record(&self, record: &Record) -> RepoResult<RecordId> {
        record.validate()?;
        let key = record.descriptor().key();
        let fingerprint = content_fingerprint(record);
        let document = encode_document(record)?;
        let timestamps = record.timestamps();

        self.conn
            .execute(
                "INSERT INTO records (
                    uuid,
                    namespace,
                    model,
                    fingerprint,
                    document,
                    created_at,
                    updated_at,
                    deleted_at,
                    is_deleted
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    record.id().to_string(),
                    key.namespace,
                    key.name,
                    fingerprint,
                    document,
                    timestamps.created_at,
                    timestamps.updated_at,
                    timestamps.deleted_at,
                    bool_to_int(record.is_deleted()),
                ],
            )
            .map_err(|err| map_write_error(err, &key, fingerprint.as_deref()))?;

        info!(
            "event=record_create module=repo status=ok model={key} id={}",
            record.id()
        );
        Ok(record.id())
    }

    fn update_record(&self, record: &Record) -> RepoResult<()> {
        record.validate()?;
        let key = record.descriptor().key();
        let fingerprint = content_fingerprint(record);
        let document = encode_document(record)?;
        let timestamps = record.timestamps();

        let changed = self
            .conn
            .execute(
                "UPDATE records
                 SET
                    fingerprint = ?1,
                    document = ?2,
                    updated_at = ?3,
                    deleted_at = ?4,
                    is_deleted = ?5
                 WHERE uuid = ?6;",
                params![
                    fingerprint,
                    document,
                    timestamps.updated_at,
                    timestamps.deleted_at,
                    bool_to_int(record.is_deleted()),
                    record.id().to_string(),
                ],
            )
            .map_err(|err| map_write_error(err, &key, fingerprint.as_deref()))?;

        if changed == 0 {
            return Err(RepoError::NotFound(record.id()));
        }
        Ok(())
    }

    fn get_record(&self, id: RecordId, include_deleted: bool) -> RepoResult<Option<StoredRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE uuid = ?1
               AND (?2 = 1 OR is_deleted = 0);"
        ))?;

        let mut rows = stmt.query(params![id.to_string(), bool_to_int(include_deleted)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn find_by_fingerprint(
        &self,
        model: &ModelKey,
        fingerprint: &str,
    ) -> RepoResult<Option<StoredRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{RECORD_SELECT_SQL}
             WHERE namespace = ?1
               AND model = ?2
               AND fingerprint = ?3
               AND is_deleted = 0;"
        ))?;

        let mut rows = stmt.query(params![model.namespace, model.name, fingerprint])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_record_row(row)?));
        }
        Ok(None)
    }

    fn list_records(&self, query: &RecordListQuery) -> RepoResult<Vec<StoredRecord>> {
        let mut sql = format!("{RECORD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<SqlValue> = Vec::new();

        if !query.include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        if let Some(model) = &query.model {
            sql.push_str(" AND namespace = ? AND model = ?");
            bind_values.push(SqlValue::Text(model.namespace.clone()));
            bind_values.push(SqlValue::Text(model.name.clone()));
        }

        sql.push_str(" ORDER BY updated_at DESC, uuid ASC");

        match (query.limit, query.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                bind_values.push(SqlValue::Integer(i64::from(limit)));
                bind_values.push(SqlValue::Integer(i64::from(offset)));
            }
            (None, 0) => {}
            (None, offset) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bind_values.push(SqlValue::Integer(i64::from(offset)));
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn soft_delete_record(&self, id: RecordId, deleted_at: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE records
             SET
                is_deleted = 1,
                deleted_at = ?2,
                updated_at = MAX(updated_at, ?2),
                document = json_set(
                    document,
                    '$.deleted_at', ?2,
                    '$.updated_at', MAX(updated_at, ?2)
                )
             WHERE uuid = ?1;",
            params![id.to_string(), deleted_at],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        info!("event=record_delete module=repo status=ok id={id}");
        Ok(())
    }
}

/// Fingerprint of the record's content, or `None` when its canonical form is
/// empty.
pub fn content_fingerprint(record: &Record) -> Option<String> {
    let has_content = record
        .normalized(&IdPolicy::Omit)
        .as_object()
        .is_some_and(|object| !object.is_empty());
    has_content.then(|| record.fingerprint())
}

fn encode_document(record: &Record) -> RepoResult<String> {
    serde_json::to_string(&record.to_document())
        .map_err(|err| RepoError::InvalidData(format!("unserializable document: {err}")))
}

fn map_write_error(err: rusqlite::Error, model: &ModelKey, fingerprint: Option<&str>) -> RepoError {
    if let (true, Some(fingerprint)) = (is_fingerprint_conflict(&err), fingerprint) {
        return RepoError::DuplicateFingerprint {
            model: model.clone(),
            fingerprint: fingerprint.to_string(),
        };
    }
    error!("event=record_write module=repo status=error model={model} error={err}");
    RepoError::Db(DbError::Sqlite(err))
}

fn is_fingerprint_conflict(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            failure.code == ErrorCode::ConstraintViolation
                && message
                    .as_deref()
                    .is_some_and(|message| message.contains("records.fingerprint"))
        }
        _ => false,
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<StoredRecord> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in records.uuid"))
    })?;

    let document_text: String = row.get("document")?;
    let document: Value = serde_json::from_str(&document_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid document for {uuid_text}: {err}"))
    })?;
    if !document.is_object() {
        return Err(RepoError::InvalidData(format!(
            "document for {uuid_text} is not an object"
        )));
    }

    let is_deleted = match row.get::<_, i64>("is_deleted")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_deleted value `{other}` in records.is_deleted"
            )));
        }
    };

    let timestamps = Timestamps {
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    };
    if timestamps.updated_at < timestamps.created_at {
        return Err(RepoError::InvalidData(format!(
            "updated_at before created_at for {uuid_text}"
        )));
    }

    Ok(StoredRecord {
        id,
        model: ModelKey::new(
            row.get::<_, String>("namespace")?,
            row.get::<_, String>("model")?,
        ),
        fingerprint: row.get("fingerprint")?,
        document,
        timestamps,
        is_deleted,
    })
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}
