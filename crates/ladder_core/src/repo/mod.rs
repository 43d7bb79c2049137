//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for catalog records.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes enforce `Record::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`,
//!   `DuplicateFingerprint`) in addition to DB transport errors.

pub mod record_repo;

pub use record_repo::{
    content_fingerprint, RecordListQuery, RecordRepository, RepoError, RepoResult,
    SqliteRecordRepository, StoredRecord,
};
