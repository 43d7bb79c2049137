//! Core domain logic for the Ladder metadata catalog.
//! This crate is the single source of truth for record, graph and
//! dedup invariants.

pub mod config;
pub mod db;
pub mod graph;
pub mod legacy;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod repo;
pub mod search;
pub mod service;
pub mod similarity;
pub mod vocab;

pub use config::{CatalogConfig, ConfigError, TenantConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use graph::sync::{GraphSynchronizer, IngestOutcome};
pub use graph::{Graph, Literal, Statement, Term};
pub use legacy::{LegacyFormat, LegacyMapper, MapperError};
pub use logging::{
    default_log_level, init_logging, log_catalog_start, logging_status, LoggingError, LoggingStatus,
};
pub use model::{
    FieldValue, ModelDefinition, ModelDescriptor, ModelKey, ModelRegistry, Record, RecordId,
};
pub use normalize::{diff, fingerprint, normalize, Change, IdPolicy, Normalizable};
pub use repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use search::{SearchError, SearchIndex, SqliteSearchIndex};
pub use service::{CatalogError, CatalogService, CreateOutcome};
pub use similarity::{string_similarity, Algorithm, SimilarityEngine, SimilaritySettings};
pub use vocab::VocabularyRegistry;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
